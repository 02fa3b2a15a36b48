use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::Path;

use log::debug;
use verso_backend::{Catalog, EngineError, NodeVersion, ReleaseDescriptor, ReleaseManager, UseRequest};
use verso_core::read_pinned_specifier;

use crate::cli::Command;

/// Runs one subcommand against `manager`, printing results to stdout.
///
/// `cwd` is where pin file lookups start.
pub async fn run(
    command: Command,
    manager: &dyn ReleaseManager,
    pin_file_name: &str,
    cwd: &Path,
) -> Result<(), EngineError> {
    match command {
        Command::Install { spec, activate } => {
            let spec = match spec {
                Some(spec) => spec,
                None => read_pinned_specifier(cwd, pin_file_name)?,
            };
            let outcome = manager.install(&spec, activate).await?;
            if outcome.activated {
                println!("Installed and activated {}", outcome.release.version);
            } else {
                println!("Installed {}", outcome.release.version);
            }
        }
        Command::Rm { spec } => {
            let outcome = manager.remove(&spec).await?;
            println!("Removed {}", outcome.version);
            if outcome.was_active {
                println!("No version is active now");
            }
        }
        Command::Use { spec, yes } => {
            let request = UseRequest {
                specifier: spec,
                project_dir: cwd.to_path_buf(),
            };
            let outcome = manager
                .use_version(request, &|release| yes || confirm_on_stdin(release))
                .await?;
            println!("Now using {}", outcome.release.version);
        }
        Command::Ls { remote } => {
            let catalog = if remote {
                manager.list_remote().await?
            } else {
                manager.list_local()?
            };
            let active = manager.active_version()?;
            if catalog.is_empty() && !remote {
                println!("No versions installed");
            }
            for line in listing_lines(&catalog, active.as_ref()) {
                println!("{line}");
            }
        }
        Command::Current => match manager.active_version()? {
            Some(version) => println!("{version}"),
            None => println!("none"),
        },
    }
    Ok(())
}

/// One line per release, newest first. The active release is marked with
/// `->`; the newest release of each LTS channel is called out.
pub fn listing_lines(catalog: &Catalog, active: Option<&NodeVersion>) -> Vec<String> {
    let mut seen_channels = HashSet::new();
    catalog
        .iter()
        .map(|release| {
            let marker = if active == Some(&release.version) {
                "->"
            } else {
                "  "
            };
            let label = match release.lts_codename.as_deref() {
                Some(name) if seen_channels.insert(name) => format!(" (Latest LTS: {name})"),
                Some(name) => format!(" (LTS: {name})"),
                None => String::new(),
            };
            format!("{marker} {}{label}", release.version)
        })
        .collect()
}

fn confirm_on_stdin(release: &ReleaseDescriptor) -> bool {
    eprint!("{} is not installed. Install it now? [y/N] ", release.version);
    let _ = std::io::stderr().flush();

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_affirmative(&answer),
        Err(error) => {
            debug!("Could not read confirmation: {error}");
            false
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::{is_affirmative, listing_lines};
    use verso_backend::{Catalog, NodeVersion, ReleaseDescriptor};

    fn release(version: &str, lts: Option<&str>) -> ReleaseDescriptor {
        ReleaseDescriptor {
            lts_codename: lts.map(str::to_string),
            ..ReleaseDescriptor::bare(version.parse().unwrap())
        }
    }

    #[test]
    fn listing_marks_active_and_latest_lts_per_channel() {
        let catalog = Catalog::remote(vec![
            release("v22.1.0", None),
            release("v20.12.2", Some("Iron")),
            release("v18.20.2", Some("Hydrogen")),
            release("v20.11.0", Some("Iron")),
        ]);
        let active = NodeVersion::new(20, 11, 0);

        let lines = listing_lines(&catalog, Some(&active));

        assert_eq!(
            lines,
            vec![
                "   v22.1.0",
                "   v20.12.2 (Latest LTS: Iron)",
                "   v18.20.2 (Latest LTS: Hydrogen)",
                "-> v20.11.0 (LTS: Iron)",
            ]
        );
    }

    #[test]
    fn listing_without_active_version_has_no_marker() {
        let catalog = Catalog::local(vec![release("v20.1.0", None)]);

        assert_eq!(listing_lines(&catalog, None), vec!["   v20.1.0"]);
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative("\n"));
        assert!(!is_affirmative("nope"));
    }
}

use clap::{Parser, Subcommand};

/// Install and switch between Node.js releases.
#[derive(Debug, Parser)]
#[command(name = "verso", version, about)]
pub struct Cli {
    /// Print debug logging to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download and install a release.
    Install {
        /// `latest`, `lts`, an LTS codename or a (partial) version. Defaults to the pin file.
        spec: Option<String>,

        /// Make the installed release active.
        #[arg(long = "use")]
        activate: bool,
    },

    /// Remove an installed release.
    #[command(alias = "uninstall")]
    Rm { spec: String },

    /// Switch the active release, installing it first if needed.
    Use {
        spec: Option<String>,

        /// Install without asking.
        #[arg(short, long)]
        yes: bool,
    },

    /// List installed releases, or every published one with `--remote`.
    #[command(alias = "list")]
    Ls {
        #[arg(long)]
        remote: bool,
    },

    /// Print the active release.
    Current,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_use_flag_maps_to_activate() {
        let cli = Cli::parse_from(["verso", "install", "20", "--use"]);

        assert!(matches!(
            cli.command,
            Command::Install { spec: Some(ref spec), activate: true } if spec == "20"
        ));
    }

    #[test]
    fn verbose_is_accepted_after_subcommand() {
        let cli = Cli::parse_from(["verso", "ls", "--remote", "-v"]);

        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Ls { remote: true }));
    }

    #[test]
    fn use_without_spec_defers_to_pin_file() {
        let cli = Cli::parse_from(["verso", "use", "--yes"]);

        assert!(matches!(cli.command, Command::Use { spec: None, yes: true }));
    }

    #[test]
    fn rm_requires_a_spec() {
        assert!(Cli::try_parse_from(["verso", "rm"]).is_err());
    }
}

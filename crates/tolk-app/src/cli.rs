use clap::{Parser, Subcommand, ValueEnum};
use tolk_vendor_deepl::LanguageListKind;

#[derive(Parser, Debug)]
#[command(name = "tolk")]
#[command(about = "Multilingual translation host with pluggable vendors")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Translate text and print the result as json
    Translate {
        /// Vendor to use, defaults to TOLK_DEFAULT_VENDOR
        #[arg(short, long)]
        vendor: Option<String>,

        /// Source language, `auto` to detect
        #[arg(short, long)]
        from: Option<String>,

        /// Target language
        #[arg(short, long)]
        to: Option<String>,

        text: String,
    },

    /// List registered vendors
    Vendors,

    /// DeepL account commands
    Deepl {
        #[command(subcommand)]
        command: DeeplCommand,
    },

    /// Log in to the vocabulary backend
    Login { username: String, password: String },

    /// Create an account on the vocabulary backend and log in with it
    Register {
        /// Also used as the login name
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        username: String,
        password: String,
    },

    /// Print the profile of the logged-in user
    Profile,

    /// Forget the stored session token
    Logout,

    /// Print saved translations, newest first
    History {
        /// Remove every saved translation instead
        #[arg(long)]
        clear: bool,
    },

    /// Serve json messages from stdin, replies go to stdout
    Serve,
}

#[derive(Subcommand, Debug)]
pub enum DeeplCommand {
    /// Characters used in the current billing period
    Usage,

    /// Languages supported by the api
    Languages {
        #[arg(long, value_enum, default_value_t = LanguageKind::Source)]
        kind: LanguageKind,

        /// Print the full table in the embedded format
        #[arg(long)]
        dump: bool,
    },

    /// Store the api auth key
    SetKey { key: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LanguageKind {
    Source,
    Target,
}

impl From<LanguageKind> for LanguageListKind {
    fn from(kind: LanguageKind) -> Self {
        match kind {
            LanguageKind::Source => LanguageListKind::Source,
            LanguageKind::Target => LanguageListKind::Target,
        }
    }
}

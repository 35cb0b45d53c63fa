use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tokengate", version, about = "Call a bearer-token API with silent refresh")]
pub struct Cli {
    /// API base URL (overrides the config file)
    #[arg(long, global = true, env = "TOKENGATE_API_BASE_URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and record the session
    Login(LoginArgs),
    /// Create an account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Issue an API call, refreshing the credential on 401
    Call {
        /// HTTP method, e.g. GET or POST
        method: String,
        /// Path relative to the base URL
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Query parameter as key=value (repeatable)
        #[arg(long = "query", short = 'q')]
        query: Vec<String>,
        #[command(flatten)]
        login: InlineLogin,
    },
    /// Fetch the profile and merge it into the session
    Profile {
        #[command(flatten)]
        login: InlineLogin,
    },
    /// Print the persisted session
    Session,
    /// Log out on the server and clear local state
    Logout,
    /// Request a password reset code
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Check a one-time code
    VerifyOtp {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
    /// Set a new password with a one-time code
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        otp: String,
    },
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email (defaults to the last one used)
    #[arg(long)]
    pub email: Option<String>,
}

/// The credential only lives for one process, so commands that need it can
/// sign in first.
#[derive(Args, Debug)]
pub struct InlineLogin {
    /// Sign in before the call
    #[arg(long)]
    pub login: bool,
    /// Account email for --login (defaults to the last one used)
    #[arg(long, requires = "login")]
    pub email: Option<String>,
}

/// Split `key=value` query arguments
pub fn parse_query(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| anyhow::anyhow!("query parameter must be key=value: {}", pair))
        })
        .collect()
}

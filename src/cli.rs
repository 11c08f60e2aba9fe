use clap::{Parser, Subcommand};
use gateway::auth::Role;

/// Clinic marketplace API gateway
#[derive(Parser)]
#[command(name = "clinic-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (defaults to GATEWAY_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the service routing table
    Services,

    /// Issue or inspect access tokens with the configured secret
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Hash or check passwords the way the auth service stores them
    Password {
        /// bcrypt cost for new hashes
        #[arg(long, env = "GATEWAY_BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
        cost: u32,
        #[command(subcommand)]
        command: PasswordCommands,
    },

    /// Print the merged OpenAPI description of all reachable services
    Openapi {
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Sign a new access token
    Issue {
        #[arg(long)]
        subject: String,
        /// CUSTOMER, DENTIST or ADMIN
        #[arg(long)]
        role: Role,
        #[arg(long)]
        verified: bool,
        #[arg(long)]
        banned: bool,
        /// Print a Set-Cookie header instead of the bare token
        #[arg(long)]
        cookie: bool,
    },
    /// Verify a token and print its claims
    Decode { token: String },
}

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Print a bcrypt hash
    Hash { password: String },
    /// Check a password against a stored hash
    Verify { password: String, hash: String },
    /// Generate a password reset token
    ResetToken,
}

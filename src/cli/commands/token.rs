use anyhow::{bail, Context};
use clap::Args;

use crate::auth::{generate_jwt, Claims};
use crate::config::config;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[arg(long, help = "Account id")]
    pub account: i64,

    #[arg(long, help = "User id")]
    pub user: i64,

    #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs) -> anyhow::Result<()> {
    if args.account <= 0 || args.user <= 0 {
        bail!("account and user must be positive");
    }

    let security = &config().security;
    let hours = args.hours.unwrap_or(security.jwt_expiry_hours);
    let claims = Claims::new(args.account, args.user, hours)?;
    let token = generate_jwt(&claims, &security.jwt_secret).context("set JWT_SECRET to mint tokens")?;

    println!("{}", token);
    Ok(())
}

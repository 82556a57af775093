use std::time::Duration;

use clap::Parser;
use dsql_clock::DurationSecs;
use dsql_tokens::{
    minter::aws::AwsTokenMinter, CacheKey, CredentialSource, DbUser, Hostname, ProfileName,
    RegionName, TokenCache,
};

#[derive(Debug, Parser)]
struct Opts {
    /// The cluster endpoint
    #[arg(long, env = "DSQL_CLUSTER_ENDPOINT")]
    hostname: Hostname,

    /// The region of the cluster
    #[arg(short, long, env = "AWS_REGION")]
    region: RegionName,

    /// The database user to generate a token for
    #[arg(short, long, env = "DSQL_USER", default_value = "admin")]
    user: DbUser,

    /// A named profile to sign with instead of the default chain
    #[arg(short, long, env = "AWS_PROFILE")]
    profile: Option<ProfileName>,

    /// Requested token lifetime in seconds
    #[arg(short, long)]
    lifetime: Option<u64>,

    /// Number of times to ask the cache for a token
    #[arg(long, default_value_t = 3)]
    rounds: u32,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let credentials = opts
        .profile
        .map(CredentialSource::Profile)
        .unwrap_or_default();

    let key = CacheKey::new(
        opts.hostname,
        opts.region,
        opts.user,
        credentials,
        opts.lifetime.map(DurationSecs),
    );

    let cache = TokenCache::new(AwsTokenMinter::new());
    tracing::debug!(policy = ?cache.policy(), "token cache ready");

    for round in 0..opts.rounds {
        let token = cache.get_token(&key).await?;
        let cached = cache.cached(&key);

        tracing::info!(
            round,
            token = format_args!("{:#}", token),
            stale = cached.as_ref().map(|c| c.stale().0),
            expiry = cached.as_ref().map(|c| c.expiry().0),
            "obtained token"
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    Ok(())
}

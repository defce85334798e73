use anyhow::{Context, bail};
use commons::{
    api,
    auth::{
        jwt::{JwtReader, TokenIssuer},
        policy::permission_claims,
    },
    cli::{Cli, Commands, ServeArgs, output::Output},
    setup::{BuildOptions, WebApplicationBuilder},
    utils::{
        logging::init_tracing,
        toml_config::{AppConfig, JwtOptions},
    },
};
use std::path::Path;
use utoipa::OpenApi;

const APP_NAME: &str = "commons-server";
const DEFAULT_POLICY: &str = "Admin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    let result = match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => serve(&cli.config, cli.verbose, args, &output).await,
        Commands::Token {
            subject,
            permissions,
        } => issue_tokens(&cli.config, &subject, &permissions, &output),
        Commands::CheckToken { token } => check_token(&cli.config, &token, &output),
        Commands::Config => show_config(&cli.config, &output),
    };

    if let Err(err) = result {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn require_jwt_options(config: &AppConfig) -> anyhow::Result<JwtOptions> {
    match &config.jwt_options {
        Some(options) => Ok(options.clone()),
        None => bail!("the JwtOptions section is not configured"),
    }
}

async fn serve(
    config_path: &Path,
    verbose: bool,
    args: ServeArgs,
    output: &Output,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    init_tracing(level, config.server.log_json);

    let policies = if args.policies.is_empty() {
        vec![DEFAULT_POLICY.to_string()]
    } else {
        args.policies
    };

    let build_options = BuildOptions::default()
        .with_jwt_authentication(!args.no_jwt)
        .with_cors(args.cors)
        .with_policies(policies);

    let controllers = api::routes::create_router(
        &build_options.authentication_policies,
        config.jwt_options.is_some(),
    );

    let app = WebApplicationBuilder::new(config)
        .with_app_info(APP_NAME, env!("CARGO_PKG_VERSION"))
        .with_controllers(controllers)
        .with_api_doc(api::ApiDoc::openapi())
        .build_web_application(Some(build_options))?;

    output.banner(APP_NAME, app.environment(), app.address());

    app.run().await?;
    Ok(())
}

fn issue_tokens(
    config_path: &Path,
    subject: &str,
    permissions: &[String],
    output: &Output,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let issuer = TokenIssuer::new(require_jwt_options(&config)?);

    let tokens = issuer.issue_token_pair(subject, &permission_claims(permissions))?;

    output.section("Tokens");
    output.field("subject", subject);
    output.field("expires_at", tokens.access_token_expires_at.to_rfc3339());
    output.field("expires_in", format!("{}s", tokens.expires_in));
    output.token("Access token", &tokens.access_token);
    output.token("Refresh token", &tokens.refresh_token);
    Ok(())
}

fn check_token(config_path: &Path, token: &str, output: &Output) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let reader = JwtReader::new(require_jwt_options(&config)?);

    let validated = reader.verify(token.trim()).context("token rejected")?;

    output.valid("Token is valid");
    output.field("valid_to", validated.valid_to.to_rfc3339());
    output.section("Claims");
    for (name, value) in validated.claims.as_map() {
        output.claim(name, value);
    }
    Ok(())
}

fn show_config(config_path: &Path, output: &Output) -> anyhow::Result<()> {
    let config = load_config(config_path)?.redacted();

    output.section("Server");
    output.field("address", config.bind_address());
    output.field("environment", config.server.environment);
    output.field("log_level", &config.server.log_level);

    match &config.jwt_options {
        Some(jwt) => {
            output.section("JwtOptions");
            output.field("Issuer", &jwt.issuer);
            output.field("Audience", &jwt.audience);
            output.field("Key", &jwt.key);
            output.field("AccessTokenLifetime", format!("{} min", jwt.access_token_lifetime));
            output.field("RefreshTokenLifetime", format!("{} min", jwt.refresh_token_lifetime));
            output.field("ClockSkew", format!("{} s", jwt.clock_skew));
        }
        None => {
            output.warning("JwtOptions section is not configured; serve needs --no-jwt");
        }
    }
    Ok(())
}

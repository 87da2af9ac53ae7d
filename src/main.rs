//! Limbo Search command line runner
//!
//! Runs the initial search of a page against an endpoint and prints the
//! resulting search data, state and visible URL as JSON.

use anyhow::{bail, Result};
use limbo_search::{
    HttpTransport, LimboSearch, MemoryRouter, Router, SearchConfig, SearchFilters, SearchOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }
    if args.iter().any(|a| a == "-V" || a == "--version") {
        println!("limbo-search {}", limbo_search::VERSION);
        return Ok(());
    }
    let Some(endpoint) = args.first() else {
        print_usage();
        bail!("missing endpoint");
    };
    let page_url = args.get(1).map(String::as_str).unwrap_or("/");

    info!("Starting limbo-search v{}", limbo_search::VERSION);

    let config = load_config()?;

    let mut transport = HttpTransport::new()?;
    if let Ok(base_url) = std::env::var("LIMBO_BASE_URL") {
        transport = transport.with_base_url(&base_url)?;
    }
    let router = Arc::new(MemoryRouter::with_address_bar(page_url));
    let filters = SearchFilters::new(endpoint.as_str()).shared();

    let options = SearchOptions::new("cli", filters, Arc::new(transport), router.clone())
        .with_config(config);
    let search = LimboSearch::create(options).await?;

    let output = serde_json::json!({
        "url": router.address(),
        "request": search.last_requested_url(),
        "state": search.state(),
        "searchData": search.search_data(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    search.dispose();
    Ok(())
}

/// Load configuration from file or use defaults
fn load_config() -> Result<SearchConfig> {
    let paths = [
        PathBuf::from("limbo-search.yml"),
        dirs::config_dir()
            .map(|p| p.join("limbo-search/config.yml"))
            .unwrap_or_default(),
    ];

    // Check environment variable first
    if let Ok(path) = std::env::var("LIMBO_SEARCH_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            let mut config = SearchConfig::from_file(&path)?;
            config.merge_env();
            return Ok(config);
        }
    }

    for path in paths.iter() {
        if path.is_file() {
            info!("Loading configuration from: {}", path.display());
            let mut config = SearchConfig::from_file(path)?;
            config.merge_env();
            return Ok(config);
        }
    }

    info!("No configuration file found, using defaults");
    let mut config = SearchConfig::default();
    config.merge_env();
    Ok(config)
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
limbo-search v{}
Run the initial search of a page and print the result

USAGE:
    limbo-search <ENDPOINT> [PAGE_URL]

ARGS:
    <ENDPOINT>    Search endpoint (absolute, or relative to LIMBO_BASE_URL)
    [PAGE_URL]    Page path and query the search starts from (default "/")

OPTIONS:
    -h, --help       Print help information
    -V, --version    Print version information

ENVIRONMENT VARIABLES:
    LIMBO_SEARCH_CONFIG          Path to a YAML configuration file
    LIMBO_BASE_URL               Base URL for relative endpoints
    LIMBO_CALL_METHOD            GET or POST
    LIMBO_SEARCH_DELAY           Debounce delay in milliseconds
    LIMBO_GROUP_PARAMETER        Group scoping parameter
    LIMBO_ENABLE_GROUPED_SEARCH  Use grouped pagination (true/false)
    LIMBO_UPDATE_URL_QUERY       Mirror searches into the URL (true/false)
    LIMBO_CLEAR_DATA_ON_ERROR    Clear data on failed searches (true/false)
"#,
        limbo_search::VERSION
    );
}

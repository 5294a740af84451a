use anyhow::{anyhow, Context, Result};
use blog::build::build_site;
use blog::config::Config;
use blog::serve::{serve, DEFAULT_PORT};
use clap::{crate_version, App, Arg, ArgMatches, SubCommand};
use std::path::Path;

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let default_port = DEFAULT_PORT.to_string();
    let matches = App::new("blog")
        .version(crate_version!())
        .about("Builds the blog into a static site")
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .help("The project file (default: the nearest `blog.yaml`)"),
        )
        .arg(
            Arg::with_name("target")
                .long("target")
                .takes_value(true)
                .value_name("DIR")
                .help(
                    "The directory the site is built into, relative to the \
                     working directory (overrides the project file's `target`)",
                ),
        )
        .arg(
            Arg::with_name("server-root")
                .long("server-root")
                .takes_value(true)
                .value_name("PATH")
                .help("The URL path the site is served under, e.g. `/blog`"),
        )
        .subcommand(
            SubCommand::with_name("build").about("Builds the site (default)"),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Builds and serves the site, rebuilding on each page load")
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .short("p")
                        .takes_value(true)
                        .default_value(&default_port)
                        .help("The port to listen on"),
                ),
        )
        .get_matches();

    let config = load_config(&matches)?;
    match matches.subcommand() {
        ("serve", Some(serve_matches)) => {
            let port = serve_matches
                .value_of("port")
                .unwrap_or(&default_port)
                .parse::<u16>()
                .context("Parsing --port")?;
            serve(config, port)
        }
        _ => {
            let summary = build_site(&config)
                .map_err(|e| anyhow!("Building site: {}", e))?;
            log::info!("Built site: {}", summary);
            Ok(())
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.value_of("config") {
        Some(path) => Config::from_project_file(Path::new(path))?,
        None => Config::from_directory(&std::env::current_dir()?)?,
    };
    if let Some(target) = matches.value_of("target") {
        let working_dir = std::env::current_dir()?;
        config = config.with_target(Path::new(target), &working_dir);
    }
    if let Some(server_root) = matches.value_of("server-root") {
        config.resolver = config.resolver.clone().with_server_root(server_root);
    }
    Ok(config)
}

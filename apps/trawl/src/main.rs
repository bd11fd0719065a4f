mod cli;

use cli::CliOptions;
use cli::Command;
use std::error::Error;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use trawl_core::ErrorKind;
use trawl_core::TrawlError;
use trawl_core::TrawlResult;
use trawl_session::Session;
use trawl_session::SessionConfig;
use trawl_session::agents;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = match cli::parse_args(std::env::args().skip(1)) {
        Ok(Command::Run(options)) => options,
        Ok(Command::Help) => {
            println!("{}", cli::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            eprintln!("trawl: {error}\n\n{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("trawl: {error}");
            let mut cause = error.source();
            while let Some(inner) = cause {
                eprintln!("  caused by: {inner}");
                cause = inner.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn session_config(options: &CliOptions) -> TrawlResult<SessionConfig> {
    let mut config = SessionConfig::from_env()?;

    if let Some(agent) = &options.user_agent {
        config.user_agent = agent.clone();
    }
    if let Some(name) = &options.agent {
        let agent = agents::by_name(name).ok_or_else(|| {
            TrawlError::new(
                ErrorKind::Config,
                "cli.agent.unknown",
                format!(
                    "unknown agent preset `{name}`; known: {}",
                    agents::names().collect::<Vec<_>>().join(", ")
                ),
            )
        })?;
        config.user_agent = agent.to_owned();
    }
    if let Some(retries) = options.retries {
        config.retries = retries;
    }

    config.validate()?;
    Ok(config)
}

fn run(options: &CliOptions) -> TrawlResult<()> {
    let config = session_config(options)?;
    debug!(user_agent = %config.user_agent, retries = config.retries, "starting session");

    let mut session = Session::new(config)?;
    session.goto(&options.url)?;

    if let Some(pattern) = &options.sanitize {
        session.sanitize(pattern)?;
    }

    if let Some(key) = &options.follow {
        session.follow_link(key)?;
    }

    if let Some(submit) = &options.submit {
        let form = session.get_form(&submit.form)?;
        let overrides: Vec<(&str, &str)> = submit
            .fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        form.submit(&mut session, submit.button.as_deref(), &overrides)?;
    }

    print_page(&session, options)
}

fn print_page(session: &Session, options: &CliOptions) -> TrawlResult<()> {
    println!("URL:   {}", session.current_url().unwrap_or_default());
    println!("Title: {}", session.title().unwrap_or_default());

    if options.show_links {
        println!("\nLinks:");
        for link in session.links() {
            let target = match link.href() {
                Some(_) => link.url(session).unwrap_or_else(|error| format!("<{}>", error.code)),
                None => "<no href>".to_owned(),
            };
            println!("  {target}  {}", link.text());
        }
    }

    if options.show_forms {
        println!("\nForms:");
        for form in session.forms() {
            println!(
                "  id={} name={} action={}",
                form.id().unwrap_or("-"),
                form.name().unwrap_or("-"),
                form.action_url(session)?
            );
            for (name, value) in form.fields().iter() {
                println!("    {name} = {value:?}");
            }
            for (name, value) in form.submits().iter() {
                println!("    [submit] {name} = {value:?}");
            }
        }
    }

    if options.show_frames {
        println!("\nFrames:");
        for frame in session.frames() {
            println!("  frame  {}", frame.src().unwrap_or("<no src>"));
        }
        for iframe in session.iframes() {
            println!("  iframe {}", iframe.src().unwrap_or("<no src>"));
        }
    }

    Ok(())
}

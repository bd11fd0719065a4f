//! Command-line argument parsing.

pub const USAGE: &str = "\
usage: trawl <url> [options]

options:
  --user-agent UA        send UA as the User-Agent header
  --agent NAME           use a named user-agent preset (chrome)
  --retries N            retry transport failures N times
  --links                list links on the final page
  --forms                list forms and their default fields
  --frames               list frames and iframes
  --follow KEY           follow the first link matching KEY
  --sanitize REGEX       strip REGEX matches from the page before reading it
  --submit FORM          submit the form matching FORM
  --button NAME          submit button to press (with --submit)
  --field NAME=VALUE     override a form field (with --submit, repeatable)
  -h, --help             show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub form: String,
    pub button: Option<String>,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub url: String,
    pub user_agent: Option<String>,
    pub agent: Option<String>,
    pub retries: Option<u32>,
    pub show_links: bool,
    pub show_forms: bool,
    pub show_frames: bool,
    pub follow: Option<String>,
    pub sanitize: Option<String>,
    pub submit: Option<SubmitOptions>,
}

pub fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut url = None;
    let mut button = None;
    let mut fields = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("missing value after {flag}"))
        };

        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--user-agent" => options.user_agent = Some(value_for("--user-agent")?),
            "--agent" => options.agent = Some(value_for("--agent")?),
            "--retries" => {
                let raw = value_for("--retries")?;
                let retries = raw
                    .parse::<u32>()
                    .map_err(|_| format!("--retries expects a non-negative integer, got `{raw}`"))?;
                options.retries = Some(retries);
            }
            "--links" => options.show_links = true,
            "--forms" => options.show_forms = true,
            "--frames" => options.show_frames = true,
            "--follow" => options.follow = Some(value_for("--follow")?),
            "--sanitize" => options.sanitize = Some(value_for("--sanitize")?),
            "--submit" => {
                options.submit = Some(SubmitOptions {
                    form: value_for("--submit")?,
                    ..SubmitOptions::default()
                });
            }
            "--button" => button = Some(value_for("--button")?),
            "--field" => {
                let raw = value_for("--field")?;
                let (name, value) = raw
                    .split_once('=')
                    .ok_or_else(|| format!("--field expects NAME=VALUE, got `{raw}`"))?;
                fields.push((name.to_owned(), value.to_owned()));
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option `{flag}`")),
            _ if url.is_some() => return Err(format!("unexpected argument `{arg}`")),
            _ => url = Some(arg),
        }
    }

    options.url = url.ok_or_else(|| "missing <url>".to_owned())?;

    if options.user_agent.is_some() && options.agent.is_some() {
        return Err("--user-agent and --agent are mutually exclusive".to_owned());
    }

    match options.submit.as_mut() {
        Some(submit) => {
            submit.button = button;
            submit.fields = fields;
        }
        None if button.is_some() || !fields.is_empty() => {
            return Err("--button and --field require --submit".to_owned());
        }
        None => {}
    }

    Ok(Command::Run(options))
}

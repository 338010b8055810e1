/// A parsed mention, e.g. `trainbot, Central, North, 6:30 pm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Lookup {
        origin: String,
        /// Empty when the user gave no second segment
        destination: String,
        time_hint: Option<String>,
    },
}

impl Command {
    /// Segment 0 is the invocation itself and is discarded. A missing, blank
    /// or literal `help` first argument means help; anything else is a lookup.
    pub fn parse(text: &str) -> Self {
        let mut args = text.split(',').skip(1).map(str::trim);

        let origin = match args.next() {
            None | Some("") | Some("help") => return Command::Help,
            Some(origin) => origin.to_string(),
        };
        let destination = args.next().unwrap_or_default().to_string();
        let time_hint = args
            .next()
            .filter(|hint| !hint.is_empty())
            .map(str::to_string);

        Command::Lookup {
            origin,
            destination,
            time_hint,
        }
    }
}

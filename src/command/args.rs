use crate::polecat::Preference;
use crate::sling::SlingRequest;

#[derive(clap::Args, Debug)]
pub struct SlingArgs {
    /// Rig to dispatch into
    pub rig: String,

    /// Reuse an idle polecat instead of creating a fresh one
    #[arg(short = 'r', long)]
    pub reuse: bool,

    /// Reuse exactly this polecat; fails if it is not idle
    #[arg(long = "polecat", value_name = "NAME", requires = "reuse")]
    pub name: Option<String>,

    /// How to rank idle polecats when reusing
    #[arg(
        long = "prefer",
        value_name = "PREF",
        requires = "reuse",
        ignore_case = true,
        value_parser = clap::builder::PossibleValuesParser::new(Preference::VALUES)
    )]
    pub prefer: Option<String>,

    /// Do not start an agent session (ignored when reusing)
    #[arg(long)]
    pub no_session: bool,

    /// Report which polecat would be used without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Command to run inside the selected polecat's clone
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl SlingArgs {
    pub fn request(&self) -> SlingRequest {
        SlingRequest {
            rig: self.rig.clone(),
            reuse: self.reuse,
            name: self.name.clone(),
            preference: self.prefer.clone(),
            no_session: self.no_session,
            dry_run: self.dry_run,
        }
    }
}

//! Flag precedence for `sling`, resolved once before any work happens.

/// Raw user flags relevant to intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub reuse: bool,
    pub named: bool,
    pub preference: bool,
    pub no_session: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Reuse,
    Fresh,
}

/// Resolved intent: what to do and which warnings to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub mode: Mode,
    pub start_session: bool,
    pub warnings: Vec<&'static str>,
}

struct Rule {
    applies: fn(&Flags) -> bool,
    mode: Mode,
    start_session: bool,
    warning: Option<&'static str>,
}

/// First matching row wins.
const RULES: &[Rule] = &[
    Rule {
        applies: |f: &Flags| (f.reuse || f.named) && f.no_session,
        mode: Mode::Reuse,
        start_session: true,
        warning: Some("--no-session ignored: a reused polecat always gets a session"),
    },
    Rule {
        applies: |f: &Flags| f.reuse || f.named,
        mode: Mode::Reuse,
        start_session: true,
        warning: None,
    },
    Rule {
        applies: |f: &Flags| f.no_session,
        mode: Mode::Fresh,
        start_session: false,
        warning: None,
    },
    Rule {
        applies: |_: &Flags| true,
        mode: Mode::Fresh,
        start_session: true,
        warning: None,
    },
];

pub fn resolve(flags: &Flags) -> Intent {
    let rule = RULES
        .iter()
        .find(|rule| (rule.applies)(flags))
        .unwrap_or(&RULES[RULES.len() - 1]);

    let mut warnings: Vec<&'static str> = rule.warning.into_iter().collect();
    if rule.mode == Mode::Fresh && flags.preference {
        warnings.push("--prefer ignored: it only ranks polecats when reusing");
    }

    Intent {
        mode: rule.mode,
        start_session: rule.start_session,
        warnings,
    }
}

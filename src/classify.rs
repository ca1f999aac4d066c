//! Category assignment for parsed source units.
//!
//! An ordered matcher list runs over each unit's identifier and shape;
//! the first match wins and nothing matching yields `Unknown`. The
//! category only routes the unit to the right mapping sub-table.

use crate::schema::{Classification, SourceUnit};
use crate::script::{ASSIGN_IDENT, GUARD_IDENT};
use crate::workflow::DECISION_IDENT;

const LOOKUP_VERBS: &[&str] = &["get", "read", "find", "query", "list", "test", "resolve"];
const MUTATION_VERBS: &[&str] = &[
    "new", "create", "start", "stop", "remove", "delete", "add", "attach", "detach", "set",
    "update", "resize", "restart", "enable", "disable", "provision",
];
const INTEGRATION_VERBS: &[&str] = &["invoke", "call", "send", "notify", "register", "submit"];

/// Phrases that mark a conditional as aborting the run.
const ABORT_MARKERS: &[&str] = &["throw", "exit", "write-error"];

type Matcher = fn(&SourceUnit) -> bool;

/// Ordered matcher table; first match wins.
///
/// `Set-Variable` style context statements are checked before the generic
/// mutation verbs so `set` does not misroute them.
const MATCHERS: &[(Matcher, Classification)] = &[
    (assigns_variable, Classification::Context),
    (is_decision_point, Classification::Gate),
    (is_aborting_guard, Classification::Gate),
    (has_lookup_verb, Classification::Lookup),
    (has_integration_verb, Classification::Integration),
    (has_mutation_verb, Classification::Mutation),
];

/// Classify one unit. Units without a recognized identifier or verb are
/// `Unknown` and excluded from mapping; the caller reports them as gaps.
pub fn classify(unit: &SourceUnit) -> Classification {
    for (matcher, classification) in MATCHERS {
        if matcher(unit) {
            return *classification;
        }
    }
    Classification::Unknown
}

fn assigns_variable(unit: &SourceUnit) -> bool {
    match unit.ident.as_deref() {
        Some(ident) => {
            ident == ASSIGN_IDENT || ident.eq_ignore_ascii_case("set-variable")
        }
        None => false,
    }
}

fn is_decision_point(unit: &SourceUnit) -> bool {
    unit.ident.as_deref() == Some(DECISION_IDENT)
}

fn is_aborting_guard(unit: &SourceUnit) -> bool {
    if unit.ident.as_deref() != Some(GUARD_IDENT) {
        return false;
    }
    let raw = unit.raw.to_ascii_lowercase();
    ABORT_MARKERS.iter().any(|marker| raw.contains(marker))
}

fn has_lookup_verb(unit: &SourceUnit) -> bool {
    ident_verb_in(unit, LOOKUP_VERBS)
}

fn has_mutation_verb(unit: &SourceUnit) -> bool {
    ident_verb_in(unit, MUTATION_VERBS)
}

fn has_integration_verb(unit: &SourceUnit) -> bool {
    ident_verb_in(unit, INTEGRATION_VERBS)
}

/// Match the leading verb of an identifier, in either `Verb-Noun` cmdlet
/// form or `VerbNoun` call form.
fn ident_verb_in(unit: &SourceUnit, verbs: &[&str]) -> bool {
    let Some(ident) = unit.ident.as_deref() else {
        return false;
    };
    let verb = leading_verb(ident);
    verbs.iter().any(|candidate| verb.eq_ignore_ascii_case(candidate))
}

fn leading_verb(ident: &str) -> &str {
    if let Some((verb, _)) = ident.split_once('-') {
        return verb;
    }
    // CamelCase call form: the verb ends where the second capital begins.
    let boundary = ident
        .char_indices()
        .skip(1)
        .find(|(_, ch)| ch.is_ascii_uppercase())
        .map(|(idx, _)| idx)
        .unwrap_or(ident.len());
    &ident[..boundary]
}

pub const STARTER_RULES_JSON: &str = include_str!("../templates/rules.json");

//! Ordered inference rules
//!
//! Heuristics that turn loose text into a typed answer are expressed as
//! ordered lists of `(matcher, result)` rules. The first matching rule wins,
//! so a specific token must be listed before any generic token that could
//! also match it as a substring.
//!
//! # Rule sets
//!
//! - `MANUFACTURER_RULES` - vendor from a bootloader product name
//! - `DEVICE_INFO_RULES` / `BOOT_INFO_RULES` - lock state from vendor queries
//! - `UNLOCKED_VAR_RULES` - lock state from the `unlocked` variable
//! - `UNLOCK_ABILITY_RULES` - OEM unlocking capability (never a lock state)

use crate::device::record::{LockState, UnlockAbility, UNKNOWN_MANUFACTURER};

/// How a rule decides whether it applies
///
/// Input is always lower-cased before matching.
#[derive(Clone, Copy)]
pub enum Matcher {
    /// Input contains any of these substrings
    AnyOf(&'static [&'static str]),
    /// Trimmed input equals one of these values
    OneOf(&'static [&'static str]),
    /// Arbitrary predicate
    Custom(fn(&str) -> bool),
}

impl Matcher {
    pub fn matches(&self, lowered: &str) -> bool {
        match self {
            Matcher::AnyOf(needles) => needles.iter().any(|n| lowered.contains(n)),
            Matcher::OneOf(values) => values.iter().any(|v| lowered.trim() == *v),
            Matcher::Custom(predicate) => predicate(lowered),
        }
    }
}

/// A single inference rule
#[derive(Clone, Copy)]
pub struct Rule<T> {
    /// Name used in logs and tests
    pub name: &'static str,
    pub matcher: Matcher,
    pub result: T,
}

impl<T> Rule<T> {
    pub const fn new(name: &'static str, matcher: Matcher, result: T) -> Self {
        Self {
            name,
            matcher,
            result,
        }
    }
}

/// Evaluate `rules` in order against `input`, returning the first match
pub fn first_match<'a, T>(rules: &'a [Rule<T>], input: &str) -> Option<&'a Rule<T>> {
    let lowered = input.to_lowercase();
    rules.iter().find(|rule| rule.matcher.matches(&lowered))
}

// ============================================================================
// Manufacturer
// ============================================================================

/// Vendor inference from a product name
///
/// Sub-brands come before their parent brand, and short tokens that could
/// appear inside other names ("lg", "moto") are listed last.
pub static MANUFACTURER_RULES: &[Rule<&str>] = &[
    Rule::new("xiaomi", Matcher::AnyOf(&["redmi", "poco", "xiaomi"]), "Xiaomi"),
    Rule::new("google", Matcher::AnyOf(&["pixel", "google"]), "Google"),
    Rule::new("samsung", Matcher::AnyOf(&["galaxy", "samsung"]), "Samsung"),
    Rule::new("oneplus", Matcher::AnyOf(&["oneplus"]), "OnePlus"),
    Rule::new("realme", Matcher::AnyOf(&["realme"]), "Realme"),
    Rule::new("oppo", Matcher::AnyOf(&["oppo"]), "OPPO"),
    Rule::new("vivo", Matcher::AnyOf(&["iqoo", "vivo"]), "vivo"),
    Rule::new("huawei", Matcher::AnyOf(&["huawei"]), "Huawei"),
    Rule::new("honor", Matcher::AnyOf(&["honor"]), "Honor"),
    Rule::new("sony", Matcher::AnyOf(&["xperia", "sony"]), "Sony"),
    Rule::new("asus", Matcher::AnyOf(&["zenfone", "asus"]), "ASUS"),
    Rule::new("nothing", Matcher::AnyOf(&["nothing"]), "Nothing"),
    Rule::new("lenovo", Matcher::AnyOf(&["lenovo"]), "Lenovo"),
    Rule::new("nokia", Matcher::AnyOf(&["nokia"]), "Nokia"),
    Rule::new("motorola", Matcher::AnyOf(&["motorola", "moto"]), "Motorola"),
    Rule::new("lg", Matcher::Custom(is_lg_product), "LG"),
];

/// "lg" only as a whole word or a model prefix ("lg-v60", "lgm-v300")
fn is_lg_product(lowered: &str) -> bool {
    lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter_map(|word| word.strip_prefix("lg"))
        .any(|rest| rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_digit() || c == 'm'))
}

/// Infer the manufacturer from a product name
///
/// Never returns an empty string: no match (or no input) yields `"unknown"`.
pub fn infer_manufacturer(product_name: &str) -> String {
    if product_name.trim().is_empty() {
        return UNKNOWN_MANUFACTURER.to_string();
    }
    first_match(MANUFACTURER_RULES, product_name)
        .map(|rule| rule.result.to_string())
        .unwrap_or_else(|| UNKNOWN_MANUFACTURER.to_string())
}

// ============================================================================
// Lock state
// ============================================================================

/// `oem device-info` output ("Device unlocked: true")
pub static DEVICE_INFO_RULES: &[Rule<LockState>] = &[
    Rule::new(
        "device-unlocked-true",
        Matcher::AnyOf(&["device unlocked: true"]),
        LockState::Unlocked,
    ),
    Rule::new(
        "device-unlocked-false",
        Matcher::AnyOf(&["device unlocked: false"]),
        LockState::Locked,
    ),
];

/// `oem boot-info` output; "unlocked" must be tested before its substring "locked"
pub static BOOT_INFO_RULES: &[Rule<LockState>] = &[
    Rule::new("unlocked", Matcher::AnyOf(&["unlocked"]), LockState::Unlocked),
    Rule::new("locked", Matcher::AnyOf(&["locked"]), LockState::Locked),
];

/// Value of the `unlocked` variable
pub static UNLOCKED_VAR_RULES: &[Rule<LockState>] = &[
    Rule::new("yes", Matcher::OneOf(&["yes", "true", "1"]), LockState::Unlocked),
    Rule::new("no", Matcher::OneOf(&["no", "false", "0"]), LockState::Locked),
];

/// Value of the `unlock_ability` variable (OEM unlocking allowed)
pub static UNLOCK_ABILITY_RULES: &[Rule<UnlockAbility>] = &[
    Rule::new(
        "unlockable",
        Matcher::OneOf(&["1", "yes", "true"]),
        UnlockAbility::Unlockable,
    ),
    Rule::new(
        "not-unlockable",
        Matcher::OneOf(&["0", "no", "false"]),
        UnlockAbility::NotUnlockable,
    ),
];

/// Resolve a lock state from text with one rule set, if conclusive
pub fn lock_state_from(rules: &[Rule<LockState>], text: &str) -> Option<LockState> {
    first_match(rules, text).map(|rule| rule.result)
}

/// Resolve the unlock capability from the `unlock_ability` value
pub fn unlock_ability_from(value: &str) -> UnlockAbility {
    first_match(UNLOCK_ABILITY_RULES, value)
        .map(|rule| rule.result)
        .unwrap_or_default()
}

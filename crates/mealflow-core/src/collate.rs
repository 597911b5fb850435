//! Ingredient collation.
//!
//! Merges freshly extracted ingredients with entries that are already known
//! (for example the items of an existing reminders list). Entries match on a
//! normalized name; matching entries with the same unit are summed, matching
//! entries whose units disagree stay as separate lines flagged as conflicts.
//! The output keeps the first-seen order of distinct names.

use std::sync::LazyLock;

use mealflow_types::state::Ingredient;
use regex::Regex;

static REMINDER_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)\s*\(([^)]+)\)\s*$").expect("valid regex"));

static LEADING_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d./]+(?:\s*-\s*[\d./]+)?)\s*(.*)$").expect("valid regex"));

/// Suffix appended to reminder text of a line whose units conflict.
pub const CONFLICT_MARKER: &str = "[check units]";

/// One line of a collated list.
#[derive(Debug, Clone, PartialEq)]
pub struct CollatedLine {
    pub ingredient: Ingredient,
    /// Same name as another line but a unit that could not be combined.
    pub conflict: bool,
    /// Indices into the `known` input folded into this line.
    pub known: Vec<usize>,
    /// Whether more than one entry was summed into this line.
    pub merged: bool,
}

impl CollatedLine {
    /// The line exists only because of newly extracted entries.
    pub fn is_new(&self) -> bool {
        self.known.is_empty()
    }

    /// A known entry whose quantity changed.
    pub fn is_updated_known(&self) -> bool {
        !self.known.is_empty() && self.merged
    }
}

/// Lowercase, trim and crudely singularize a name or unit for matching.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if let Some(stem) = name.strip_suffix("oes") {
        format!("{stem}o")
    } else if let Some(stem) = name.strip_suffix("ies") {
        format!("{stem}y")
    } else if name.ends_with("es") && !name.ends_with("sses") {
        name[..name.len() - 2].to_string()
    } else if name.ends_with('s') && !name.ends_with("ss") {
        name[..name.len() - 1].to_string()
    } else {
        name
    }
}

/// Parse a textual amount: integers, decimals, fractions, mixed numbers
/// ("1 1/2") and ranges ("1-2", first number wins).
pub fn parse_amount(amount: &str) -> Option<f64> {
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }
    let amount = match amount.split_once('-') {
        Some((first, _)) if !first.trim().is_empty() => first.trim(),
        _ => amount,
    };

    let mut total = 0.0;
    let mut parts = 0;
    for part in amount.split_whitespace() {
        total += parse_number(part)?;
        parts += 1;
    }
    (parts > 0).then_some(total)
}

fn parse_number(text: &str) -> Option<f64> {
    if let Some((num, den)) = text.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    match text {
        "½" => Some(0.5),
        "⅓" => Some(1.0 / 3.0),
        "⅔" => Some(2.0 / 3.0),
        "¼" => Some(0.25),
        "¾" => Some(0.75),
        "⅛" => Some(0.125),
        _ => text.parse().ok(),
    }
}

/// Render an amount without trailing zeros ("3", "1.5", "0.33").
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{}", value as i64);
    }
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Format an ingredient as reminder text: `name (amount unit)`.
pub fn format_reminder_text(item: &Ingredient) -> String {
    let quantity = format!("{} {}", item.amount.trim(), item.unit.trim());
    let quantity = quantity.trim();
    if quantity.is_empty() {
        item.name.trim().to_string()
    } else {
        format!("{} ({quantity})", item.name.trim())
    }
}

/// Parse reminder text written by [`format_reminder_text`] back into an
/// ingredient. Text without a parenthesized quantity becomes a bare name.
pub fn parse_reminder_text(text: &str) -> Ingredient {
    let text = text.trim();
    let text = text.strip_suffix(CONFLICT_MARKER).map(str::trim_end).unwrap_or(text);
    let Some(caps) = REMINDER_TEXT.captures(text) else {
        return Ingredient::new(text, "", "");
    };
    let name = caps[1].trim();
    let inside = caps[2].trim();
    if inside.contains('+') {
        return Ingredient::new(name, inside, "");
    }
    match LEADING_AMOUNT.captures(inside) {
        Some(amount) => Ingredient::new(name, amount[1].trim(), amount[2].trim()),
        None => Ingredient::new(name, inside, ""),
    }
}

fn units_compatible(a: &Ingredient, b: &Ingredient) -> bool {
    normalize_name(&a.unit) == normalize_name(&b.unit)
}

/// Collate `extracted` entries into the `known` ones.
///
/// Every known entry produces a line (possibly merged); extracted entries
/// either merge into a line with the same normalized name and unit or open a
/// new line. Lines sharing a name but not a unit are all flagged `conflict`.
pub fn collate(known: &[Ingredient], extracted: &[Ingredient]) -> Vec<CollatedLine> {
    // (normalized name, lines in first-seen order)
    let mut groups: Vec<(String, Vec<CollatedLine>)> = Vec::new();

    let entries = known
        .iter()
        .enumerate()
        .map(|(i, item)| (item, Some(i)))
        .chain(extracted.iter().map(|item| (item, None)));

    for (item, known_index) in entries {
        let key = normalize_name(&item.name);
        let group = match groups.iter().position(|(name, _)| *name == key) {
            Some(pos) => &mut groups[pos].1,
            None => {
                groups.push((key, Vec::new()));
                let last = groups.len() - 1;
                &mut groups[last].1
            }
        };

        let target = group.iter_mut().find(|line| {
            units_compatible(&line.ingredient, item)
                && parse_amount(&line.ingredient.amount).is_some()
                && parse_amount(&item.amount).is_some()
        });

        match target {
            Some(line) => {
                let sum = parse_amount(&line.ingredient.amount).unwrap_or_default()
                    + parse_amount(&item.amount).unwrap_or_default();
                line.ingredient.amount = format_amount(sum);
                line.merged = true;
                line.known.extend(known_index);
            }
            None => group.push(CollatedLine {
                ingredient: item.clone(),
                conflict: false,
                known: known_index.into_iter().collect(),
                merged: false,
            }),
        }
    }

    groups
        .into_iter()
        .flat_map(|(_, mut lines)| {
            if lines.len() > 1 {
                for line in &mut lines {
                    line.conflict = true;
                }
            }
            lines
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_singularizes() {
        assert_eq!(normalize_name(" Tomatoes "), "tomato");
        assert_eq!(normalize_name("berries"), "berry");
        assert_eq!(normalize_name("eggs"), "egg");
        assert_eq!(normalize_name("glass"), "glass");
        assert_eq!(normalize_name("Garlic"), "garlic");
    }

    #[test]
    fn parse_amount_variants() {
        assert_eq!(parse_amount("2"), Some(2.0));
        assert_eq!(parse_amount("1/2"), Some(0.5));
        assert_eq!(parse_amount("1.5"), Some(1.5));
        assert_eq!(parse_amount("1-2"), Some(1.0));
        assert_eq!(parse_amount("1 1/2"), Some(1.5));
        assert_eq!(parse_amount("½"), Some(0.5));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("a pinch"), None);
        assert_eq!(parse_amount("1/0"), None);
    }

    #[test]
    fn format_amount_trims() {
        assert_eq!(format_amount(3.0), "3");
        assert_eq!(format_amount(1.5), "1.5");
        assert_eq!(format_amount(1.0 / 3.0), "0.33");
    }

    #[test]
    fn same_unit_entries_sum() {
        let lines = collate(
            &[],
            &[
                Ingredient::new("garlic", "2", "cloves"),
                Ingredient::new("Garlic", "1", "cloves"),
            ],
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].ingredient, Ingredient::new("garlic", "3", "cloves"));
        assert!(!lines[0].conflict);
    }

    #[test]
    fn differing_units_conflict() {
        let lines = collate(
            &[],
            &[
                Ingredient::new("salt", "1", "tsp"),
                Ingredient::new("salt", "1", "lb"),
            ],
        );
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.conflict));
        assert_eq!(lines[0].ingredient.unit, "tsp");
        assert_eq!(lines[1].ingredient.unit, "lb");
    }

    #[test]
    fn one_sided_unit_conflicts() {
        let lines = collate(
            &[Ingredient::new("onion", "1", "")],
            &[Ingredient::new("onions", "2", "cups")],
        );
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.conflict));
    }

    #[test]
    fn known_entries_merge_and_keep_order() {
        let known = vec![
            Ingredient::new("eggs", "3", "large"),
            Ingredient::new("milk", "1", "cup"),
        ];
        let extracted = vec![
            Ingredient::new("basil", "1", "bunch"),
            Ingredient::new("egg", "2", "large"),
        ];
        let lines = collate(&known, &extracted);
        let names: Vec<&str> = lines.iter().map(|l| l.ingredient.name.as_str()).collect();
        assert_eq!(names, ["eggs", "milk", "basil"]);

        assert_eq!(lines[0].ingredient.amount, "5");
        assert!(lines[0].is_updated_known());
        assert_eq!(lines[1].known, [1]);
        assert!(!lines[1].merged);
        assert!(lines[2].is_new());
    }

    #[test]
    fn unparseable_amounts_stay_separate() {
        let lines = collate(
            &[],
            &[
                Ingredient::new("pepper", "to taste", ""),
                Ingredient::new("pepper", "1", ""),
            ],
        );
        assert_eq!(lines.len(), 2);
        assert!(lines[0].conflict && lines[1].conflict);
    }

    #[test]
    fn reminder_text_round_trip() {
        let item = Ingredient::new("olive oil", "2", "tablespoons");
        let text = format_reminder_text(&item);
        assert_eq!(text, "olive oil (2 tablespoons)");
        assert_eq!(parse_reminder_text(&text), item);

        assert_eq!(format_reminder_text(&Ingredient::new("salt", "", "")), "salt");
        assert_eq!(parse_reminder_text("salt (1)"), Ingredient::new("salt", "1", ""));
        assert_eq!(
            parse_reminder_text("flour (1 cup + 2 tbsp)"),
            Ingredient::new("flour", "1 cup + 2 tbsp", "")
        );
        assert_eq!(parse_reminder_text("bread"), Ingredient::new("bread", "", ""));
        assert_eq!(
            parse_reminder_text("salt (1 lb) [check units]"),
            Ingredient::new("salt", "1", "lb")
        );
    }
}

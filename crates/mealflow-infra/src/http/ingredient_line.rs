//! Splits a free-text ingredient line ("2 1/2 cups flour, sifted") into
//! amount, unit and name.

use std::sync::LazyLock;

use mealflow_types::state::Ingredient;
use regex::Regex;

const VULGAR: &str = "½⅓⅔¼¾⅕⅖⅗⅘⅙⅚⅛⅜⅝⅞";

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    let number = format!(
        r"(?:\d+\s+\d+/\d+|\d+/\d+|\d+(?:[.,]\d+)?(?:\s*[{VULGAR}])?|[{VULGAR}])"
    );
    Regex::new(&format!(r"^({number}(?:\s*(?:-|–|to)\s*{number})?)\s*")).expect("valid regex")
});

static RANGE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:-|–|\bto\b)\s*").expect("valid regex"));

static PARENTHETICAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Units recognised directly after the amount, lowercase without a trailing dot.
const UNITS: &[&str] = &[
    "cup", "cups", "c",
    "tablespoon", "tablespoons", "tbsp", "tbsps", "tbs", "tbl",
    "teaspoon", "teaspoons", "tsp", "tsps",
    "ounce", "ounces", "oz",
    "pound", "pounds", "lb", "lbs",
    "gram", "grams", "g",
    "kilogram", "kilograms", "kg",
    "milliliter", "milliliters", "millilitre", "millilitres", "ml",
    "liter", "liters", "litre", "litres", "l",
    "pint", "pints", "pt",
    "quart", "quarts", "qt",
    "gallon", "gallons", "gal",
    "clove", "cloves",
    "can", "cans",
    "package", "packages", "pkg",
    "stick", "sticks",
    "slice", "slices",
    "pinch", "pinches",
    "dash", "dashes",
    "bunch", "bunches",
    "sprig", "sprigs",
    "piece", "pieces",
    "head", "heads",
    "handful", "handfuls",
    "jar", "jars",
    "stalk", "stalks",
    "sheet", "sheets",
];

/// Parse one ingredient line. Returns `None` for blank lines.
pub fn parse_ingredient_line(line: &str) -> Option<Ingredient> {
    let line = WHITESPACE.replace_all(line.trim(), " ");
    if line.is_empty() {
        return None;
    }

    let (amount, rest) = match AMOUNT.captures(&line) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let amount = RANGE_SEPARATOR.replace_all(caps[1].trim(), "-").into_owned();
            (amount, &line[whole..])
        }
        None => (String::new(), &line[..]),
    };

    let (unit, rest) = split_unit(rest);
    let name = clean_name(rest);
    let name = if name.is_empty() { clean_name(&line) } else { name };

    Some(Ingredient::new(name, amount, unit))
}

/// Leading unit token, if it is in the vocabulary.
fn split_unit(rest: &str) -> (String, &str) {
    let token_end = rest.find(' ').unwrap_or(rest.len());
    let token = &rest[..token_end];
    let normalized = token.trim_end_matches('.').to_lowercase();
    if !normalized.is_empty() && UNITS.contains(&normalized.as_str()) {
        (token.trim_end_matches('.').to_string(), rest[token_end..].trim_start())
    } else {
        (String::new(), rest)
    }
}

/// Drop parentheticals, preparation notes after a comma and a leading "of".
fn clean_name(rest: &str) -> String {
    let without_notes = PARENTHETICAL.replace_all(rest, " ");
    let head = without_notes.split(',').next().unwrap_or_default();
    let head = WHITESPACE.replace_all(head.trim(), " ");
    head.strip_prefix("of ").unwrap_or(&head).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> (String, String, String) {
        let i = parse_ingredient_line(line).unwrap();
        (i.amount, i.unit, i.name)
    }

    fn triple(amount: &str, unit: &str, name: &str) -> (String, String, String) {
        (amount.to_string(), unit.to_string(), name.to_string())
    }

    #[test]
    fn amount_unit_and_name() {
        assert_eq!(parse("2 cups all-purpose flour"), triple("2", "cups", "all-purpose flour"));
        assert_eq!(parse("1.5 tbsp. olive oil"), triple("1.5", "tbsp", "olive oil"));
        assert_eq!(parse("400g spaghetti"), triple("400", "g", "spaghetti"));
    }

    #[test]
    fn fractions_and_ranges() {
        assert_eq!(parse("2 1/2 cups milk"), triple("2 1/2", "cups", "milk"));
        assert_eq!(parse("1/4 teaspoon salt"), triple("1/4", "teaspoon", "salt"));
        assert_eq!(parse("½ cup sugar"), triple("½", "cup", "sugar"));
        assert_eq!(parse("1½ cups rice"), triple("1½", "cups", "rice"));
        assert_eq!(parse("2-3 cloves garlic, minced"), triple("2-3", "cloves", "garlic"));
        assert_eq!(parse("1 to 2 pinches of saffron"), triple("1-2", "pinches", "saffron"));
    }

    #[test]
    fn lines_without_amount_or_unit() {
        assert_eq!(parse("3 eggs"), triple("3", "", "eggs"));
        assert_eq!(parse("Salt and pepper, to taste"), triple("", "", "Salt and pepper"));
        assert_eq!(parse("1 (14 oz) can tomatoes"), triple("1", "", "can tomatoes"));
        assert!(parse_ingredient_line("   ").is_none());
    }
}

//! Deck-list text dialects
//!
//! Each dialect parser either claims the whole text or answers `None`, and
//! the first parser in [`PARSERS`] that claims it wins. Plain text (one
//! name per line) always succeeds, so every input yields a [`DeckList`].

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

lazy_static! {
    /// `4 Lightning Bolt`, `4x Lightning Bolt`, `4x\tLightning Bolt`
    static ref QUANTITY_LINE: Regex = Regex::new(r"^(\d+)\s*[xX]?\s+(\S.*)$").unwrap();
    /// MTGS: `4x<TAB>Lightning Bolt`
    static ref MTGS_LINE: Regex = Regex::new(r"^(\d+)x\t(.+)$").unwrap();
    /// Magic Workstation: `4 [MOR] Heritage Druid` (brackets may be empty)
    static ref MWDECK_LINE: Regex = Regex::new(r"^(\d+)\s+\[([^\]]*)\]\s*(\S.*)$").unwrap();
    /// Arena suffix: `Lightning Bolt (M10) 146`
    static ref ARENA_SUFFIX: Regex =
        Regex::new(r"^(.+?)\s+\(([A-Za-z0-9]{2,6})\)(?:\s+\S+)?$").unwrap();
}

const MWDECK_HEADER: &str = "// Deck file for Magic Workstation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `.mtgsDeck`: `[DECK]` ... `[/DECK]`, `4x<TAB>Name`
    Mtgs,
    /// `.mwDeck`: `4 [SET] Name`, `SB:` sideboard
    MwDeck,
    /// `.dec`: `// comments`, `SB: 2 Name`
    Dec,
    /// MTGO / Arena text: `4 Name`, blank line or `Sideboard` before the sideboard
    Quantity,
    /// One name per line; `SB:` lines go to the sideboard
    Plain,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Mtgs => "mtgs",
            Dialect::MwDeck => "mwdeck",
            Dialect::Dec => "dec",
            Dialect::Quantity => "quantity",
            Dialect::Plain => "plain",
        }
    }

    /// Dialect implied by a file extension, if any
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mtgsdeck" => Some(Dialect::Mtgs),
            "mwdeck" => Some(Dialect::MwDeck),
            "dec" => Some(Dialect::Dec),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mtgs" | "mtgsdeck" => Ok(Dialect::Mtgs),
            "mwdeck" | "mw" => Ok(Dialect::MwDeck),
            "dec" => Ok(Dialect::Dec),
            "quantity" | "mtgo" | "arena" | "txt" => Ok(Dialect::Quantity),
            "plain" => Ok(Dialect::Plain),
            other => Err(format!("unknown deck dialect: {}", other)),
        }
    }
}

/// One card entry of a deck list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckLine {
    /// 1-based line in the source text
    pub line_number: usize,
    pub quantity: u32,
    pub name: String,
    /// Set code embedded in the line, uppercase
    pub set_code: Option<String>,
    pub sideboard: bool,
}

impl DeckLine {
    fn new(line_number: usize, quantity: u32, name: &str, sideboard: bool) -> Self {
        Self {
            line_number,
            quantity,
            name: name.trim().to_string(),
            set_code: None,
            sideboard,
        }
    }

    fn with_set(mut self, set_code: &str) -> Self {
        let code = set_code.trim();
        if !code.is_empty() {
            self.set_code = Some(code.to_uppercase());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckList {
    pub dialect: Dialect,
    pub lines: Vec<DeckLine>,
}

impl DeckList {
    pub fn main_deck(&self) -> impl Iterator<Item = &DeckLine> {
        self.lines.iter().filter(|l| !l.sideboard)
    }

    pub fn sideboard(&self) -> impl Iterator<Item = &DeckLine> {
        self.lines.iter().filter(|l| l.sideboard)
    }

    /// Total number of cards, counting quantities
    pub fn card_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// A parser for one dialect; `None` means "not my dialect"
pub trait DialectParser: Sync {
    fn dialect(&self) -> Dialect;
    fn parse(&self, text: &str) -> Option<Vec<DeckLine>>;
}

/// Auto-detection order
pub static PARSERS: [&dyn DialectParser; 5] = [
    &MtgsParser,
    &MwDeckParser,
    &DecParser,
    &QuantityParser,
    &PlainParser,
];

/// Parse deck-list text.
///
/// A forced dialect is tried first; if it rejects the text the usual
/// detection chain runs.
pub fn parse(text: &str, forced: Option<Dialect>) -> DeckList {
    if let Some(dialect) = forced {
        if let Some(parser) = PARSERS.iter().find(|p| p.dialect() == dialect) {
            if let Some(lines) = parser.parse(text) {
                return DeckList { dialect, lines };
            }
            log::warn!("Deck list is not valid {} text, detecting dialect", dialect);
        }
    }

    for parser in PARSERS.iter() {
        if let Some(lines) = parser.parse(text) {
            log::debug!("Parsed {} deck lines as {}", lines.len(), parser.dialect());
            return DeckList {
                dialect: parser.dialect(),
                lines,
            };
        }
    }

    // PlainParser never rejects
    DeckList {
        dialect: Dialect::Plain,
        lines: Vec::new(),
    }
}

/// Non-blank lines with their 1-based numbers, trimmed
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')))
}

fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('#')
}

/// `Sideboard`, `Sideboard:`, `SIDEBOARD` ...
fn is_sideboard_marker(line: &str) -> bool {
    line.trim_end_matches(':').eq_ignore_ascii_case("sideboard")
}

fn strip_sb_prefix(line: &str) -> Option<&str> {
    let prefix = line.get(..3)?;
    if prefix.eq_ignore_ascii_case("SB:") {
        Some(line[3..].trim_start())
    } else {
        None
    }
}

fn quantity_line(line_number: usize, line: &str, sideboard: bool) -> Option<DeckLine> {
    let caps = QUANTITY_LINE.captures(line)?;
    let quantity = caps[1].parse().ok()?;
    Some(DeckLine::new(line_number, quantity, &caps[2], sideboard))
}

pub struct MtgsParser;

impl DialectParser for MtgsParser {
    fn dialect(&self) -> Dialect {
        Dialect::Mtgs
    }

    fn parse(&self, text: &str) -> Option<Vec<DeckLine>> {
        if !numbered_lines(text).any(|(_, l)| l.eq_ignore_ascii_case("[DECK]")) {
            return None;
        }

        let mut lines = Vec::new();
        let mut in_deck = false;
        let mut sideboard = false;
        for (number, line) in numbered_lines(text) {
            if line.eq_ignore_ascii_case("[DECK]") {
                in_deck = true;
                continue;
            }
            if line.eq_ignore_ascii_case("[/DECK]") {
                in_deck = false;
                continue;
            }
            if !in_deck || line.is_empty() || line.starts_with("[URL") || line.starts_with("[/URL") {
                continue;
            }
            if is_sideboard_marker(line) {
                sideboard = true;
                continue;
            }
            let parsed = match MTGS_LINE.captures(line) {
                Some(caps) => caps[1]
                    .parse()
                    .ok()
                    .map(|qty| DeckLine::new(number, qty, &caps[2], sideboard)),
                None => quantity_line(number, line, sideboard),
            };
            match parsed {
                Some(deck_line) => lines.push(deck_line),
                None => log::debug!("Skipping unrecognized MTGS line {}: {}", number, line),
            }
        }
        Some(lines)
    }
}

pub struct MwDeckParser;

impl DialectParser for MwDeckParser {
    fn dialect(&self) -> Dialect {
        Dialect::MwDeck
    }

    fn parse(&self, text: &str) -> Option<Vec<DeckLine>> {
        let claimed = numbered_lines(text).any(|(_, line)| {
            line.starts_with(MWDECK_HEADER)
                || MWDECK_LINE.is_match(strip_sb_prefix(line).unwrap_or(line))
        });
        if !claimed {
            return None;
        }

        let mut lines = Vec::new();
        for (number, line) in numbered_lines(text) {
            if line.is_empty() || is_comment(line) {
                continue;
            }
            let (line, sideboard) = match strip_sb_prefix(line) {
                Some(rest) => (rest, true),
                None => (line, false),
            };
            let parsed = match MWDECK_LINE.captures(line) {
                Some(caps) => caps[1]
                    .parse()
                    .ok()
                    .map(|qty| DeckLine::new(number, qty, &caps[3], sideboard).with_set(&caps[2])),
                None => quantity_line(number, line, sideboard),
            };
            match parsed {
                Some(deck_line) => lines.push(deck_line),
                None => log::debug!("Skipping unrecognized mwDeck line {}: {}", number, line),
            }
        }
        Some(lines)
    }
}

pub struct DecParser;

impl DialectParser for DecParser {
    fn dialect(&self) -> Dialect {
        Dialect::Dec
    }

    fn parse(&self, text: &str) -> Option<Vec<DeckLine>> {
        let claimed = numbered_lines(text)
            .any(|(_, line)| line.starts_with("//") || strip_sb_prefix(line).is_some());
        if !claimed {
            return None;
        }

        let mut lines = Vec::new();
        for (number, line) in numbered_lines(text) {
            if line.is_empty() || is_comment(line) {
                continue;
            }
            let (line, sideboard) = match strip_sb_prefix(line) {
                Some(rest) => (rest, true),
                None => (line, false),
            };
            // Every card line must carry a quantity
            lines.push(quantity_line(number, line, sideboard)?);
        }
        Some(lines)
    }
}

pub struct QuantityParser;

impl DialectParser for QuantityParser {
    fn dialect(&self) -> Dialect {
        Dialect::Quantity
    }

    fn parse(&self, text: &str) -> Option<Vec<DeckLine>> {
        let mut lines = Vec::new();
        let mut sideboard = false;
        let mut section_has_cards = false;
        let mut pending_break = false;

        for (number, line) in numbered_lines(text) {
            if line.is_empty() {
                pending_break = section_has_cards;
                continue;
            }
            if is_sideboard_marker(line) {
                sideboard = true;
                section_has_cards = false;
                pending_break = false;
                continue;
            }
            if is_section_header(line) {
                // `Deck` after a `Commander`/`Companion` block is still the main deck
                sideboard = false;
                section_has_cards = false;
                pending_break = false;
                continue;
            }

            let mut deck_line = quantity_line(number, line, sideboard)?;
            if pending_break && !sideboard {
                sideboard = true;
                deck_line.sideboard = true;
            }
            pending_break = false;
            section_has_cards = true;

            if let Some(caps) = ARENA_SUFFIX.captures(&deck_line.name) {
                let name = caps[1].to_string();
                let set_code = caps[2].to_string();
                deck_line.name = name;
                deck_line = deck_line.with_set(&set_code);
            }
            lines.push(deck_line);
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines)
        }
    }
}

/// Arena/MTGO section headers other than the sideboard
fn is_section_header(line: &str) -> bool {
    let header = line.trim_end_matches(':');
    ["deck", "main", "maindeck", "main deck", "commander", "companion"]
        .iter()
        .any(|h| header.eq_ignore_ascii_case(h))
}

pub struct PlainParser;

impl DialectParser for PlainParser {
    fn dialect(&self) -> Dialect {
        Dialect::Plain
    }

    fn parse(&self, text: &str) -> Option<Vec<DeckLine>> {
        let mut lines = Vec::new();
        let mut sideboard = false;
        for (number, line) in numbered_lines(text) {
            if line.is_empty() || is_comment(line) {
                continue;
            }
            if is_sideboard_marker(line) {
                sideboard = true;
                continue;
            }
            // `SB: 2 Name` left over from .dec or mwDeck text
            let deck_line = match strip_sb_prefix(line) {
                Some(rest) => quantity_line(number, rest, true)
                    .unwrap_or_else(|| DeckLine::new(number, 1, rest, true)),
                None => DeckLine::new(number, 1, line, sideboard),
            };
            lines.push(deck_line);
        }
        Some(lines)
    }
}

#[cfg(test)]
#[path = "dialect_tests.rs"]
mod tests;

use std::fmt;

use tracing::debug;

use crate::ast::*;
use crate::blocks::{split_blocks, split_lines, Block, BlockKind};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: entity header has no name")]
    MissingEntityName { line: usize },
    #[error("line {line}: attribute has no name")]
    MissingAttributeName { line: usize },
    #[error("line {line}: participant {entity} has no cardinality")]
    MissingCardinality { line: usize, entity: String },
    #[error("line {line}: unknown cardinality symbol {symbol:?}")]
    UnknownCardinality { line: usize, symbol: String },
}

impl ParseError {
    /// 1-based input line the error points at.
    pub fn line(&self) -> usize {
        match self {
            Self::MissingEntityName { line }
            | Self::MissingAttributeName { line }
            | Self::MissingCardinality { line, .. }
            | Self::UnknownCardinality { line, .. } => *line,
        }
    }
}

/// Every block-local failure from one parse, in input order. A failed
/// block stops at its first bad line; sibling blocks still parse.
#[derive(Debug)]
pub struct ParseErrors {
    pub errors: Vec<ParseError>,
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

/// Storage classes accepted as a type token, by lowercased base form.
const STORAGE_TYPES: &[&str] = &[
    "int", "integer", "bigint", "smallint", "serial", "real", "float", "double", "decimal",
    "numeric", "varchar", "char", "character", "text", "date", "time", "timestamp", "datetime",
    "interval", "boolean", "bool", "blob", "binary", "uuid", "json",
];

fn is_storage_type(token: &str) -> bool {
    let base = token.split('(').next().unwrap_or(token).to_lowercase();
    STORAGE_TYPES.contains(&base.as_str())
}

/// First run of characters outside `stop` and whitespace.
fn scan_name(line: &str, stop: &[char]) -> Option<String> {
    let mut name = String::new();
    for c in line.chars() {
        if c.is_whitespace() || stop.contains(&c) {
            if name.is_empty() {
                continue;
            }
            break;
        }
        name.push(c);
    }
    if name.is_empty() { None } else { Some(name) }
}

/// Split a line's parenthesized SQL clues into (type, qualifiers).
/// The first clue token is a type only when it names a known storage
/// class; otherwise the whole clue string lands in qualifiers.
fn parse_sql_clues(line: &str) -> (Option<String>, Option<String>) {
    let Some(open) = line.find('(') else {
        return (None, None);
    };
    let close = match line.rfind(')') {
        Some(i) if i > open => i,
        _ => return (None, None),
    };
    let clues = line[open + 1..close].trim();
    let Some(first) = clues.split_whitespace().next() else {
        return (None, None);
    };
    if is_storage_type(first) {
        let qualifiers = clues[first.len()..].trim();
        let qualifiers = (!qualifiers.is_empty()).then(|| qualifiers.to_string());
        (Some(first.to_string()), qualifiers)
    } else {
        (None, Some(clues.to_string()))
    }
}

pub struct Parser {
    lines: Vec<String>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            lines: split_lines(source),
        }
    }

    pub fn parse(&self) -> Result<ConceptualModel, ParseErrors> {
        let mut model = ConceptualModel {
            entities: Vec::new(),
            inheritances: Vec::new(),
            associations: Vec::new(),
        };
        let mut errors = Vec::new();
        let blocks = split_blocks(&self.lines);
        for block in &blocks {
            if let Err(e) = self.parse_block(*block, &mut model) {
                errors.push(e);
            }
        }
        debug!(
            blocks = blocks.len(),
            entities = model.entities.len(),
            inheritances = model.inheritances.len(),
            associations = model.associations.len(),
            "parsed conceptual model"
        );
        if errors.is_empty() {
            Ok(model)
        } else {
            Err(ParseErrors { errors })
        }
    }

    fn parse_block(&self, block: Block, model: &mut ConceptualModel) -> Result<(), ParseError> {
        match BlockKind::classify(&self.lines[block.start]) {
            BlockKind::Entity => {
                let entity = self.parse_entity(block)?;
                // A redeclared name replaces the earlier entity in place.
                match model.entities.iter_mut().find(|e| e.name == entity.name) {
                    Some(existing) => *existing = entity,
                    None => model.entities.push(entity),
                }
            }
            BlockKind::Inheritance => {
                model.inheritances.extend(self.parse_inheritance(block));
            }
            BlockKind::Association => {
                model.associations.push(self.parse_association(block)?);
            }
            BlockKind::Other => {}
        }
        Ok(())
    }

    fn parse_entity(&self, block: Block) -> Result<Entity, ParseError> {
        let header = &self.lines[block.start];
        let name = scan_name(header, &['[', ']', '"']).ok_or(ParseError::MissingEntityName {
            line: block.start + 1,
        })?;
        Ok(Entity {
            name,
            attributes: self.parse_attributes(block.start + 1, block.end)?,
            weak: header.starts_with("[["),
        })
    }

    fn parse_attributes(&self, start: usize, end: usize) -> Result<Vec<Attribute>, ParseError> {
        let mut attributes = Vec::new();
        for i in start..end {
            let line = &self.lines[i];
            let (is_key, rest) = match line.strip_prefix('+') {
                Some(rest) => (true, rest),
                None => (false, line.as_str()),
            };
            let name = scan_name(rest, &['(', ')', '"'])
                .ok_or(ParseError::MissingAttributeName { line: i + 1 })?;
            let (typ, qualifiers) = parse_sql_clues(rest);
            attributes.push(Attribute {
                name,
                is_key,
                typ,
                qualifiers,
            });
        }
        Ok(attributes)
    }

    fn parse_inheritance(&self, block: Block) -> Vec<Inheritance> {
        let mut groups = Vec::new();
        for i in block.start + 1..block.end {
            let mut parts = self.lines[i].split_whitespace();
            let Some(parent) = parts.next() else { continue };
            groups.push(Inheritance {
                parent: parent.to_string(),
                children: parts.map(str::to_string).collect(),
            });
        }
        groups
    }

    fn parse_association(&self, block: Block) -> Result<Association, ParseError> {
        let header = &self.lines[block.start];
        let name = scan_name(header, &['{', '}', '"']);
        let weak = header.starts_with("{{");
        let mut entities = Vec::new();
        let mut attributes = Vec::new();
        for i in block.start + 1..block.end {
            let line = &self.lines[i];
            if line.starts_with('-') {
                attributes = self.parse_attributes(i + 1, block.end)?;
                break;
            }
            let mut parts = line.split_whitespace();
            let Some(entity) = parts.next() else { continue };
            let symbol = parts.next().ok_or_else(|| ParseError::MissingCardinality {
                line: i + 1,
                entity: entity.to_string(),
            })?;
            let card =
                Card::from_symbol(symbol).ok_or_else(|| ParseError::UnknownCardinality {
                    line: i + 1,
                    symbol: symbol.to_string(),
                })?;
            entities.push(Participant {
                entity: entity.to_string(),
                card,
            });
        }
        Ok(Association {
            name,
            weak,
            entities,
            attributes,
        })
    }
}

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConceptualModel {
    pub entities: Vec<Entity>,
    pub inheritances: Vec<Inheritance>,
    pub associations: Vec<Association>,
}

impl ConceptualModel {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub weak: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub is_key: bool,
    #[serde(rename = "type")]
    pub typ: Option<String>,
    pub qualifiers: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inheritance {
    pub parent: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Association {
    pub name: Option<String>,
    pub weak: bool,
    pub entities: Vec<Participant>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub entity: String,
    pub card: Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cardinality {
    Many,      // *  0,n
    OneOrMore, // +  1,n
    ZeroOrOne, // ?  0,1
    One,       // 1  1,1
}

impl Cardinality {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '*' => Some(Self::Many),
            '+' => Some(Self::OneOrMore),
            '?' => Some(Self::ZeroOrOne),
            '1' => Some(Self::One),
            _ => None,
        }
    }

    /// (minimum, maximum), `None` meaning unbounded.
    pub fn bounds(&self) -> (u32, Option<u32>) {
        match self {
            Self::Many => (0, None),
            Self::OneOrMore => (1, None),
            Self::ZeroOrOne => (0, Some(1)),
            Self::One => (1, Some(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Modifier {
    /// `R`: the foreign key this side receives joins its own primary key.
    Identifying,
    /// `>`: direction hint, rendering only.
    Forward,
    /// `<`: direction hint, rendering only.
    Backward,
}

/// A decoded cardinality symbol: base cardinality plus optional modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Card {
    pub cardinality: Cardinality,
    pub modifier: Option<Modifier>,
}

impl Card {
    /// Decode a one- or two-character symbol such as `*`, `1R` or `?>`.
    /// Unknown second characters and anything past the second are ignored.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let mut chars = symbol.chars();
        let cardinality = Cardinality::from_char(chars.next()?)?;
        let modifier = match chars.next() {
            Some('R') => Some(Modifier::Identifying),
            Some('>') => Some(Modifier::Forward),
            Some('<') => Some(Modifier::Backward),
            _ => None,
        };
        Some(Self {
            cardinality,
            modifier,
        })
    }

    /// At most one instance on this side (`?` or `1`).
    pub fn at_most_one(&self) -> bool {
        matches!(self.cardinality, Cardinality::ZeroOrOne | Cardinality::One)
    }

    /// Exactly one instance (`1`).
    pub fn mandatory(&self) -> bool {
        self.cardinality == Cardinality::One
    }

    pub fn identifying(&self) -> bool {
        self.modifier == Some(Modifier::Identifying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_bounds() {
        assert_eq!(Card::from_symbol("*").unwrap().cardinality.bounds(), (0, None));
        assert_eq!(Card::from_symbol("+").unwrap().cardinality.bounds(), (1, None));
        assert_eq!(Card::from_symbol("?").unwrap().cardinality.bounds(), (0, Some(1)));
        assert_eq!(Card::from_symbol("1").unwrap().cardinality.bounds(), (1, Some(1)));
    }

    #[test]
    fn test_identifying_modifier() {
        let card = Card::from_symbol("1R").unwrap();
        assert!(card.identifying());
        assert!(card.mandatory());
        assert!(card.at_most_one());
    }

    #[test]
    fn test_direction_modifiers() {
        assert_eq!(Card::from_symbol("*>").unwrap().modifier, Some(Modifier::Forward));
        assert_eq!(Card::from_symbol("+<").unwrap().modifier, Some(Modifier::Backward));
        assert!(!Card::from_symbol("*>").unwrap().identifying());
    }

    #[test]
    fn test_unknown_symbols() {
        assert_eq!(Card::from_symbol(""), None);
        assert_eq!(Card::from_symbol("x"), None);
        assert_eq!(Card::from_symbol("2"), None);
    }

    #[test]
    fn test_unknown_second_char_ignored() {
        let card = Card::from_symbol("1X").unwrap();
        assert_eq!(card.cardinality, Cardinality::One);
        assert_eq!(card.modifier, None);
    }

    #[test]
    fn test_at_most_one() {
        assert!(Card::from_symbol("?").unwrap().at_most_one());
        assert!(Card::from_symbol("1").unwrap().at_most_one());
        assert!(!Card::from_symbol("*").unwrap().at_most_one());
        assert!(!Card::from_symbol("+").unwrap().at_most_one());
    }
}

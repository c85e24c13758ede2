//! Relational model derivation from the conceptual model.

use serde::Serialize;
use tracing::debug;

use crate::ast::{Association, Attribute, ConceptualModel, Participant};

#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error("unknown entity: {name}")]
    DanglingReference { name: String },
    #[error("inheritance parent {parent} has no key attribute")]
    ParentWithoutKey { parent: String },
    #[error("multi-level inheritance is not supported: {entity}")]
    NestedInheritance { entity: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: Option<String>,
    pub is_key: bool,
    pub qualifiers: Option<String>,
    /// Entity this field references, when it is a foreign key.
    pub references: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicalModel {
    pub tables: Vec<Table>,
}

impl LogicalModel {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, DeriveError> {
        self.tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| DeriveError::DanglingReference {
                name: name.to_string(),
            })
    }

    /// Derive tables, fields and keys from a conceptual model. Table and
    /// field order is a pure function of declaration order.
    pub fn from_conceptual(model: &ConceptualModel) -> Result<Self, DeriveError> {
        let mut logical = LogicalModel { tables: Vec::new() };
        logical.add_entity_tables(model);
        logical.propagate_inheritance_keys(model)?;
        logical.resolve_associations(model)?;
        debug!(tables = logical.tables.len(), "derived logical model");
        Ok(logical)
    }

    /// Pass 1: one table per entity, fields copied in attribute order.
    fn add_entity_tables(&mut self, model: &ConceptualModel) {
        for entity in &model.entities {
            let fields = entity
                .attributes
                .iter()
                .map(|attr| Field {
                    name: attr.name.clone(),
                    typ: attr.typ.clone(),
                    is_key: attr.is_key,
                    qualifiers: attr.qualifiers.clone(),
                    references: attr.qualifiers.as_deref().and_then(referenced_entity),
                })
                .collect();
            self.tables.push(Table {
                name: entity.name.clone(),
                fields,
            });
        }
    }

    /// Pass 1b: every child of an inheritance group gets a key field
    /// referencing its parent's first key field.
    fn propagate_inheritance_keys(&mut self, model: &ConceptualModel) -> Result<(), DeriveError> {
        // Single level only: a parent that is elsewhere a child is rejected.
        for inh in &model.inheritances {
            if model
                .inheritances
                .iter()
                .any(|other| other.children.contains(&inh.parent))
            {
                return Err(DeriveError::NestedInheritance {
                    entity: inh.parent.clone(),
                });
            }
        }
        for inh in &model.inheritances {
            let parent =
                self.table(&inh.parent)
                    .ok_or_else(|| DeriveError::DanglingReference {
                        name: inh.parent.clone(),
                    })?;
            let key = parent
                .fields
                .iter()
                .find(|f| f.is_key)
                .ok_or_else(|| DeriveError::ParentWithoutKey {
                    parent: inh.parent.clone(),
                })?;
            let field = Field {
                name: format!("{}_id", inh.parent),
                typ: key.typ.clone(),
                is_key: true,
                qualifiers: Some(append_qualifier(
                    key.qualifiers.as_deref(),
                    &format!("foreign key references {}", inh.parent),
                )),
                references: Some(inh.parent.clone()),
            };
            for child in &inh.children {
                self.table_mut(child)?.fields.push(field.clone());
            }
        }
        Ok(())
    }

    /// Pass 2: absorb at-most-one associations as foreign keys; create a
    /// join table when every participant is on a "many" side.
    fn resolve_associations(&mut self, model: &ConceptualModel) -> Result<(), DeriveError> {
        for assoc in &model.associations {
            for p in &assoc.entities {
                if model.entity(&p.entity).is_none() {
                    return Err(DeriveError::DanglingReference {
                        name: p.entity.clone(),
                    });
                }
            }
            let mut absorbed = false;
            let mut candidates: Vec<(&str, Vec<&Attribute>)> = Vec::new();
            for p in &assoc.entities {
                if p.card.at_most_one() {
                    absorbed = true;
                    self.push_absorbed_keys(model, assoc, p)?;
                } else {
                    let keys = model
                        .entity(&p.entity)
                        .map(|e| e.attributes.iter().filter(|a| a.is_key).collect())
                        .unwrap_or_default();
                    candidates.push((p.entity.as_str(), keys));
                }
            }
            if !absorbed && candidates.len() > 1 {
                self.tables.push(join_table(assoc, &candidates));
            }
        }
        Ok(())
    }

    /// The at-most-one participant's table receives one foreign key per
    /// key attribute of every other-named participant.
    fn push_absorbed_keys(
        &mut self,
        model: &ConceptualModel,
        assoc: &Association,
        p: &Participant,
    ) -> Result<(), DeriveError> {
        for other in &assoc.entities {
            if other.entity == p.entity {
                continue;
            }
            let Some(source) = model.entity(&other.entity) else {
                continue;
            };
            for attr in source.attributes.iter().filter(|a| a.is_key) {
                let mut qualifier = format!("foreign key references {}", other.entity);
                if p.card.mandatory() && !p.card.identifying() {
                    qualifier.push_str(" not null");
                }
                self.table_mut(&p.entity)?.fields.push(Field {
                    name: format!("{}_{}", other.entity, attr.name),
                    typ: attr.typ.clone(),
                    is_key: p.card.identifying(),
                    qualifiers: Some(qualifier),
                    references: Some(other.entity.clone()),
                });
            }
        }
        Ok(())
    }
}

fn join_table(assoc: &Association, candidates: &[(&str, Vec<&Attribute>)]) -> Table {
    let name = assoc.name.clone().unwrap_or_else(|| {
        candidates
            .iter()
            .map(|(entity, _)| *entity)
            .collect::<Vec<_>>()
            .join("_")
    });
    let mut fields: Vec<Field> = Vec::new();
    for (entity, keys) in candidates {
        for attr in keys {
            fields.push(Field {
                name: format!("{}_{}", entity, attr.name),
                typ: attr.typ.clone(),
                is_key: true,
                qualifiers: Some(append_qualifier(
                    attr.qualifiers.as_deref(),
                    &format!("foreign key references {entity} not null"),
                )),
                references: Some((*entity).to_string()),
            });
        }
    }
    dedup_field_names(&mut fields);
    for attr in &assoc.attributes {
        fields.push(Field {
            name: attr.name.clone(),
            typ: attr.typ.clone(),
            is_key: false,
            qualifiers: attr.qualifiers.clone(),
            references: None,
        });
    }
    Table { name, fields }
}

/// A self-association generates the same field name once per role; later
/// occurrences get a numeric suffix, counting up until unique.
fn dedup_field_names(fields: &mut [Field]) {
    for i in 0..fields.len() {
        let first = fields.iter().position(|f| f.name == fields[i].name);
        if first == Some(i) {
            continue;
        }
        let mut suffix = 2;
        loop {
            let candidate = format!("{}{}", fields[i].name, suffix);
            if !fields.iter().any(|f| f.name == candidate) {
                fields[i].name = candidate;
                break;
            }
            suffix += 1;
        }
    }
}

/// Extract the target of a free-text `references <Name>` qualifier.
fn referenced_entity(qualifiers: &str) -> Option<String> {
    let mut tokens = qualifiers.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok.eq_ignore_ascii_case("references") {
            return tokens.next().map(str::to_string);
        }
    }
    None
}

fn append_qualifier(existing: Option<&str>, added: &str) -> String {
    match existing {
        Some(q) if !q.is_empty() => format!("{q} {added}"),
        _ => added.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn derive(input: &str) -> LogicalModel {
        let model = Parser::new(input).parse().unwrap();
        LogicalModel::from_conceptual(&model).unwrap()
    }

    fn derive_err(input: &str) -> DeriveError {
        let model = Parser::new(input).parse().unwrap();
        LogicalModel::from_conceptual(&model).unwrap_err()
    }

    #[test]
    fn test_entity_tables() {
        let logical = derive("[Person]\n+id (integer)\nname (varchar not null)");
        assert_eq!(logical.tables.len(), 1);
        let table = logical.table("Person").unwrap();
        assert_eq!(table.fields.len(), 2);
        assert!(table.fields[0].is_key);
        assert_eq!(table.fields[0].typ.as_deref(), Some("integer"));
        assert_eq!(table.fields[1].qualifiers.as_deref(), Some("not null"));
        assert_eq!(table.fields[1].references, None);
    }

    #[test]
    fn test_references_qualifier_carried_forward() {
        let logical = derive("[A]\n+id (int)\ndept (references Department)");
        let field = &logical.table("A").unwrap().fields[1];
        assert_eq!(field.references.as_deref(), Some("Department"));
        assert_eq!(field.qualifiers.as_deref(), Some("references Department"));
    }

    #[test]
    fn test_inheritance_key_propagation() {
        let input = "\
[Vehicle]
+id (integer)
brand (varchar)

[Car]
doors (int)

[Truck]
axles (int)

i
Vehicle Car Truck";
        let logical = derive(input);
        for child in ["Car", "Truck"] {
            let table = logical.table(child).unwrap();
            let fk = table.fields.last().unwrap();
            assert_eq!(fk.name, "Vehicle_id");
            assert_eq!(fk.typ.as_deref(), Some("integer"));
            assert!(fk.is_key);
            assert_eq!(fk.references.as_deref(), Some("Vehicle"));
        }
    }

    #[test]
    fn test_inheritance_takes_first_key_by_order() {
        let input = "\
[P]
a (text)
+k1 (int)
+k2 (bigint)

[C]
x (text)

i
P C";
        let fk = derive(input).table("C").unwrap().fields.last().unwrap().clone();
        assert_eq!(fk.typ.as_deref(), Some("int"));
    }

    #[test]
    fn test_optional_side_foreign_key() {
        let input = "\
[Person]
+id (integer)

[Car]
+plate (varchar)

{Drives}
Person 1
Car ?R";
        let logical = derive(input);
        // Car is identifying: the FK joins its primary key, no join table.
        let car_fk = logical.table("Car").unwrap().fields.last().unwrap().clone();
        assert_eq!(car_fk.name, "Person_id");
        assert_eq!(car_fk.typ.as_deref(), Some("integer"));
        assert!(car_fk.is_key);
        assert_eq!(car_fk.references.as_deref(), Some("Person"));
        assert_eq!(
            car_fk.qualifiers.as_deref(),
            Some("foreign key references Person")
        );
        // Person's side is mandatory and non-identifying: plain not-null FK.
        let person_fk = logical.table("Person").unwrap().fields.last().unwrap().clone();
        assert_eq!(person_fk.name, "Car_plate");
        assert!(!person_fk.is_key);
        assert_eq!(
            person_fk.qualifiers.as_deref(),
            Some("foreign key references Car not null")
        );
        assert_eq!(logical.tables.len(), 2);
    }

    #[test]
    fn test_many_to_many_join_table() {
        let input = "\
[Student]
+id (integer)

[Course]
+code (varchar)

{Enrolls}
Student *
Course *
-
grade (int)";
        let logical = derive(input);
        let table = logical.table("Enrolls").unwrap();
        assert_eq!(table.fields.len(), 3);
        assert_eq!(table.fields[0].name, "Student_id");
        assert!(table.fields[0].is_key);
        assert_eq!(table.fields[0].references.as_deref(), Some("Student"));
        assert_eq!(table.fields[1].name, "Course_code");
        assert!(table.fields[1].is_key);
        assert_eq!(table.fields[2].name, "grade");
        assert!(!table.fields[2].is_key);
        assert_eq!(table.fields[2].typ.as_deref(), Some("int"));
        // Neither entity table absorbed a foreign key.
        assert_eq!(logical.table("Student").unwrap().fields.len(), 1);
        assert_eq!(logical.table("Course").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_unnamed_join_table_concatenates_entities() {
        let input = "\
[A]
+id (int)

[B]
+id (int)

{}
A *
B +";
        let logical = derive(input);
        assert!(logical.table("A_B").is_some());
    }

    #[test]
    fn test_self_association_renames_duplicates() {
        let input = "\
[Person]
+id (integer)

{Parent}
Person *
Person *";
        let names: Vec<String> = derive(input)
            .table("Parent")
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["Person_id", "Person_id2"]);
    }

    #[test]
    fn test_triple_self_association() {
        let input = "\
[Person]
+id (integer)

{Chain}
Person *
Person *
Person *";
        let names: Vec<String> = derive(input)
            .table("Chain")
            .unwrap()
            .fields
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["Person_id", "Person_id2", "Person_id3"]);
    }

    #[test]
    fn test_absorbed_association_creates_no_table() {
        let input = "\
[A]
+id (int)

[B]
+id (int)

{R}
A ?
B *";
        let logical = derive(input);
        assert_eq!(logical.tables.len(), 2);
        assert!(logical.table("R").is_none());
        // A absorbed B's key.
        assert_eq!(logical.table("A").unwrap().fields[1].name, "B_id");
    }

    #[test]
    fn test_single_many_participant_creates_no_table() {
        let logical = derive("[A]\n+id (int)\n\n{Solo}\nA *");
        assert_eq!(logical.tables.len(), 1);
    }

    #[test]
    fn test_ternary_all_many_association() {
        let input = "\
[A]
+id (int)

[B]
+id (int)

[C]
+id (int)

{T}
A *
B +
C *";
        let table = derive(input).table("T").unwrap().clone();
        assert_eq!(table.fields.len(), 3);
        assert!(table.fields.iter().all(|f| f.is_key));
    }

    #[test]
    fn test_dangling_association_reference() {
        let err = derive_err("[A]\n+id (int)\n\n{R}\nA 1\nGhost *");
        assert!(matches!(err, DeriveError::DanglingReference { name } if name == "Ghost"));
    }

    #[test]
    fn test_dangling_inheritance_parent() {
        let err = derive_err("[C]\n+id (int)\n\ni\nGhost C");
        assert!(matches!(err, DeriveError::DanglingReference { name } if name == "Ghost"));
    }

    #[test]
    fn test_parent_without_key() {
        let err = derive_err("[P]\nname (text)\n\n[C]\nx (int)\n\ni\nP C");
        assert!(matches!(err, DeriveError::ParentWithoutKey { parent } if parent == "P"));
    }

    #[test]
    fn test_nested_inheritance_rejected() {
        let input = "\
[A]
+id (int)

[B]
+id (int)

[C]
+id (int)

i
A B
B C";
        let err = derive_err(input);
        assert!(matches!(err, DeriveError::NestedInheritance { entity } if entity == "B"));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let input = "\
[Student]
+id (integer)

[Course]
+code (varchar)

{Enrolls}
Student *
Course *
-
grade (int)

{Tutors}
Student 1
Course ?";
        let model = Parser::new(input).parse().unwrap();
        let first = LogicalModel::from_conceptual(&model).unwrap();
        let second = LogicalModel::from_conceptual(&model).unwrap();
        assert_eq!(first, second);
    }
}

//! Read query description shared by the store implementations.

use crm_core::{Ordering, Relation};

/// Equality filter (`column = value`), values compared in their text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    /// Whether a JSON cell matches this filter.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match row.get(&self.column) {
            Some(serde_json::Value::String(s)) => s == &self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    pub embeds: Vec<Relation>,
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
}

impl Select {
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            embeds: Vec::new(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn embed(mut self, relations: &[Relation]) -> Self {
        self.embeds.extend_from_slice(relations);
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order(mut self, order: Ordering) -> Self {
        self.order = Some(order);
        self
    }

    /// PostgREST `select` parameter, e.g. `*,contacts(nom,prenom)`.
    pub fn columns(&self) -> String {
        let mut columns = String::from("*");
        for relation in &self.embeds {
            columns.push(',');
            columns.push_str(relation.table);
            columns.push('(');
            columns.push_str(&relation.columns.join(","));
            columns.push(')');
        }
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTACTS: Relation = Relation {
        table: "contacts",
        foreign_key: "contact_id",
        columns: &["nom", "prenom"],
    };

    #[test]
    fn select_parameter_lists_embedded_relations() {
        let query = Select::from("devis").embed(&[CONTACTS]);
        assert_eq!(query.columns(), "*,contacts(nom,prenom)");
        assert_eq!(Select::from("taches").columns(), "*");
    }

    #[test]
    fn filters_compare_text_forms() {
        let row = json!({ "id": "abc", "quantite": 2, "verrouille": true, "note": null });
        assert!(Filter::eq("id", "abc").matches(&row));
        assert!(Filter::eq("quantite", 2).matches(&row));
        assert!(Filter::eq("verrouille", true).matches(&row));
        assert!(!Filter::eq("note", "null").matches(&row));
        assert!(!Filter::eq("missing", "x").matches(&row));
    }

    proptest::proptest! {
        #[test]
        fn numeric_cells_match_their_own_text(n in proptest::num::i64::ANY, other in proptest::num::i64::ANY) {
            let row = json!({ "quantite": n });
            proptest::prop_assert!(Filter::eq("quantite", n).matches(&row));
            proptest::prop_assert_eq!(Filter::eq("quantite", other).matches(&row), n == other);
        }
    }
}

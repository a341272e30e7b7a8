//! Policy persistence contract
//!
//! The engine never touches files or the network. An [`Adapter`] moves rows
//! between some backing store and a [`Model`]; [`MemoryAdapter`] keeps them
//! in memory and reads/writes the usual CSV-like text form:
//!
//! ```text
//! p, alice, data1, read
//! g, alice, data2_admin
//! ```

use crate::core::model::{Model, PolicyValues};
use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Row filter for partial loads; each list matches from field 0 and empty
/// entries are wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub p: Vec<String>,
    #[serde(default)]
    pub g: Vec<String>,
}

/// Backing store for policy rows
pub trait Adapter: Send + Sync {
    /// Load every row into `model`
    fn load_policy(&mut self, model: &mut Model) -> Result<()>;

    /// Load only rows matching `filter`
    fn load_filtered_policy(&mut self, model: &mut Model, filter: &Filter) -> Result<()>;

    /// Whether the last load was filtered
    fn is_filtered(&self) -> bool;

    /// Replace the stored rows with the model's
    fn save_policy(&mut self, model: &Model) -> Result<()>;

    fn add_policy(&mut self, section: &str, ptype: &str, rule: &PolicyValues) -> Result<bool>;

    fn add_policies(&mut self, section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool>;

    fn remove_policy(&mut self, section: &str, ptype: &str, rule: &PolicyValues) -> Result<bool>;

    fn remove_policies(&mut self, section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool>;

    fn remove_filtered_policy(
        &mut self,
        section: &str,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<bool>;

    fn update_policy(
        &mut self,
        section: &str,
        ptype: &str,
        old: &PolicyValues,
        new: &PolicyValues,
    ) -> Result<bool>;
}

/// Adapter holding rows in memory
///
/// # Examples
/// ```
/// use warden_rs::MemoryAdapter;
///
/// let adapter = MemoryAdapter::from_csv_str("
/// ## permissions
/// p, alice, data1, read
/// g, alice, \"admin, root\"
/// ").unwrap();
/// assert_eq!(adapter.len(), 2);
/// assert!(adapter.to_csv_string().contains("\"admin, root\""));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    rows: Vec<(String, PolicyValues)>,
    filtered: bool,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse CSV-like policy text: one row per line, type name first,
    /// `#` comments and blank lines skipped, double quotes protect commas
    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut adapter = MemoryAdapter::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = split_csv_line(line)
                .map_err(|e| WardenError::Adapter(format!("line {}: {}", i + 1, e)))?;
            if fields.len() < 2 {
                return Err(WardenError::Adapter(format!(
                    "line {}: expected a type name and at least one value",
                    i + 1
                )));
            }
            let ptype = fields.remove(0);
            adapter.push(ptype, PolicyValues::from(fields));
        }
        Ok(adapter)
    }

    /// Render the stored rows as CSV-like text
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        for (ptype, row) in &self.rows {
            push_csv_field(&mut out, ptype);
            for field in row.iter() {
                out.push_str(", ");
                push_csv_field(&mut out, field);
            }
            out.push('\n');
        }
        out
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stored rows as `(type, row)` pairs
    pub fn rows(&self) -> &[(String, PolicyValues)] {
        &self.rows
    }

    fn push(&mut self, ptype: String, row: PolicyValues) -> bool {
        if self.position(&ptype, &row).is_some() {
            return false;
        }
        self.rows.push((ptype, row));
        true
    }

    fn position(&self, ptype: &str, row: &PolicyValues) -> Option<usize> {
        self.rows.iter().position(|(t, r)| t == ptype && r == row)
    }

    fn load(&mut self, model: &mut Model, filter: Option<&Filter>) -> Result<()> {
        let mut loaded = 0;
        for (ptype, row) in &self.rows {
            if let Some(filter) = filter {
                let wanted = match ptype.get(..1) {
                    Some("p") => &filter.p,
                    Some("g") => &filter.g,
                    _ => continue,
                };
                if !row.matches_filter(0, wanted) {
                    continue;
                }
            }
            if model.load_policy_row(ptype, row.clone())? {
                loaded += 1;
            }
        }
        info!("Loaded {} policy rows", loaded);
        Ok(())
    }
}

impl Adapter for MemoryAdapter {
    fn load_policy(&mut self, model: &mut Model) -> Result<()> {
        self.filtered = false;
        self.load(model, None)
    }

    fn load_filtered_policy(&mut self, model: &mut Model, filter: &Filter) -> Result<()> {
        self.filtered = true;
        self.load(model, Some(filter))
    }

    fn is_filtered(&self) -> bool {
        self.filtered
    }

    fn save_policy(&mut self, model: &Model) -> Result<()> {
        if self.filtered {
            return Err(WardenError::Adapter(
                "cannot save a filtered policy".to_string(),
            ));
        }
        let mut rows = Vec::new();
        for sec in ["p", "g"] {
            if let Some(defs) = model.section(sec) {
                for (ptype, a) in defs {
                    rows.extend(a.policy.iter().map(|r| (ptype.clone(), r.clone())));
                }
            }
        }
        info!("Saved {} policy rows", rows.len());
        self.rows = rows;
        Ok(())
    }

    fn add_policy(&mut self, _section: &str, ptype: &str, rule: &PolicyValues) -> Result<bool> {
        Ok(self.push(ptype.to_string(), rule.clone()))
    }

    fn add_policies(&mut self, _section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        if rules.iter().any(|r| self.position(ptype, r).is_some()) {
            return Ok(false);
        }
        for rule in rules {
            self.push(ptype.to_string(), rule.clone());
        }
        Ok(true)
    }

    fn remove_policy(&mut self, _section: &str, ptype: &str, rule: &PolicyValues) -> Result<bool> {
        match self.position(ptype, rule) {
            Some(i) => {
                self.rows.remove(i);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_policies(&mut self, _section: &str, ptype: &str, rules: &[PolicyValues]) -> Result<bool> {
        if !rules.iter().all(|r| self.position(ptype, r).is_some()) {
            return Ok(false);
        }
        self.rows
            .retain(|(t, r)| !(t == ptype && rules.contains(r)));
        Ok(true)
    }

    fn remove_filtered_policy(
        &mut self,
        _section: &str,
        ptype: &str,
        field_index: usize,
        values: &[String],
    ) -> Result<bool> {
        let before = self.rows.len();
        self.rows
            .retain(|(t, r)| !(t == ptype && r.matches_filter(field_index, values)));
        Ok(self.rows.len() != before)
    }

    fn update_policy(
        &mut self,
        _section: &str,
        ptype: &str,
        old: &PolicyValues,
        new: &PolicyValues,
    ) -> Result<bool> {
        match self.position(ptype, old) {
            Some(i) => {
                self.rows[i].1 = new.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Append `field`, quoting it when a plain rendering would not read back
fn push_csv_field(out: &mut String, field: &str) {
    let quoted = field.contains(',')
        || field.contains('"')
        || field.starts_with('#')
        || field.trim() != field;
    if quoted {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Split one CSV line, trimming unquoted whitespace around fields
fn split_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut field = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            }
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            match chars.next() {
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(',') => fields.push(field),
                Some(c) => return Err(format!("unexpected '{}' after quoted field", c)),
            }
        } else {
            loop {
                match chars.next() {
                    None => {
                        fields.push(field.trim_end().to_string());
                        return Ok(fields);
                    }
                    Some(',') => break,
                    Some(c) => field.push(c),
                }
            }
            fields.push(field.trim_end().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "
[request_definition]
r = sub, obj, act
[policy_definition]
p = sub, obj, act
[role_definition]
g = _, _
[policy_effect]
e = some(where (p.eft == allow))
[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
";

    #[test]
    fn test_split_csv_line() {
        assert_eq!(split_csv_line("p, alice, data1, read").unwrap(), vec!["p", "alice", "data1", "read"]);
        assert_eq!(
            split_csv_line(r#"p, "a, b", "say ""hi""", c"#).unwrap(),
            vec!["p", "a, b", "say \"hi\"", "c"]
        );
        assert_eq!(split_csv_line("p, , x").unwrap(), vec!["p", "", "x"]);
        assert!(split_csv_line("p, \"open").is_err());
    }

    #[test]
    fn test_load_and_save() {
        let mut adapter = MemoryAdapter::from_csv_str(
            "p, alice, data1, read\n\n# comment\np, bob, data2, write\ng, alice, admin\n",
        )
        .unwrap();
        let mut model = Model::from_text(MODEL).unwrap();
        adapter.load_policy(&mut model).unwrap();
        assert_eq!(model.get_policy("p", "p").len(), 2);
        assert_eq!(model.get_policy("g", "g").len(), 1);

        model
            .add_policy("p", "p", PolicyValues::from(["carol", "data3", "read"]))
            .unwrap();
        adapter.save_policy(&model).unwrap();
        assert_eq!(adapter.len(), 4);
        assert!(adapter.to_csv_string().contains("p, carol, data3, read\n"));
    }

    #[test]
    fn test_filtered_load() {
        let mut adapter =
            MemoryAdapter::from_csv_str("p, alice, data1, read\np, bob, data2, write\ng, alice, admin\ng, bob, admin\n")
                .unwrap();
        let mut model = Model::from_text(MODEL).unwrap();
        let filter = Filter {
            p: vec!["".into(), "data2".into()],
            g: vec!["alice".into()],
        };
        adapter.load_filtered_policy(&mut model, &filter).unwrap();
        assert!(adapter.is_filtered());
        assert_eq!(model.get_policy("p", "p"), vec![PolicyValues::from(["bob", "data2", "write"])]);
        assert_eq!(model.get_policy("g", "g"), vec![PolicyValues::from(["alice", "admin"])]);
        assert!(adapter.save_policy(&model).is_err());
    }

    #[test]
    fn test_unknown_type_fails_load() {
        let mut adapter = MemoryAdapter::from_csv_str("p9, alice, data1, read\n").unwrap();
        let mut model = Model::from_text(MODEL).unwrap();
        assert!(matches!(
            adapter.load_policy(&mut model),
            Err(WardenError::AssertionNotFound { .. })
        ));
    }

    #[test]
    fn test_incremental_edits() {
        let mut adapter = MemoryAdapter::new();
        let r1 = PolicyValues::from(["alice", "data1", "read"]);
        let r2 = PolicyValues::from(["bob", "data1", "read"]);
        assert!(adapter.add_policy("p", "p", &r1).unwrap());
        assert!(!adapter.add_policy("p", "p", &r1).unwrap());
        assert!(adapter.add_policies("p", "p", &[r2.clone()]).unwrap());
        assert!(adapter.update_policy("p", "p", &r2, &PolicyValues::from(["bob", "data2", "read"])).unwrap());
        assert!(adapter.remove_filtered_policy("p", "p", 2, &["read".to_string()]).unwrap());
        assert!(adapter.is_empty());
        assert!(!adapter.remove_policy("p", "p", &r1).unwrap());
    }
}

use toml_edit::{DocumentMut, Item, Table, Value};

/// Helpers for addressing settings documents by dotted keys such as
/// `updaters.version.major_orgs`.
pub struct TomlUtils;

impl TomlUtils {
    /// Splits a dotted key, rejecting empty segments.
    pub fn split_key(key: &str) -> Option<Vec<&str>> {
        let segments: Vec<&str> = key.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(segments)
    }

    pub fn get<'a>(doc: &'a DocumentMut, key: &str) -> Option<&'a Item> {
        let segments = Self::split_key(key)?;
        let mut item = doc.as_item();
        for segment in segments {
            item = item.get(segment)?;
        }
        Some(item)
    }

    pub fn get_mut<'a>(doc: &'a mut DocumentMut, key: &str) -> Option<&'a mut Item> {
        let segments = Self::split_key(key)?;
        let mut item = doc.as_item_mut();
        for segment in segments {
            item = item.get_mut(segment)?;
        }
        Some(item)
    }

    /// Returns the table that holds the last segment of `key`, creating
    /// implicit intermediate tables as needed. `None` when a segment on the
    /// way is not a table.
    pub fn parent_table<'a>(
        doc: &'a mut DocumentMut,
        key: &str,
    ) -> Option<(&'a mut Table, String)> {
        let segments = Self::split_key(key)?;
        let (last, parents) = segments.split_last()?;

        let mut table = doc.as_table_mut();
        for segment in parents {
            let item = table.entry(segment).or_insert_with(|| {
                let mut nested = Table::new();
                nested.set_implicit(true);
                Item::Table(nested)
            });
            table = item.as_table_mut()?;
        }
        Some((table, last.to_string()))
    }

    /// Interprets a command-line value: TOML literals (numbers, booleans,
    /// arrays, quoted strings) are kept typed, anything else becomes a string.
    pub fn parse_value(raw: &str) -> Value {
        let mut value = raw
            .trim()
            .parse::<Value>()
            .unwrap_or_else(|_| Value::from(raw.trim()));
        value.decor_mut().clear();
        value
    }

    /// Appends to the array held by `item`, turning an empty item into a new
    /// array. Returns false when `item` holds something else.
    pub fn push_to_array(item: &mut Item, value: Value) -> bool {
        if item.is_none() {
            *item = Item::Value(Value::Array(Default::default()));
        }
        match item.as_array_mut() {
            Some(array) => {
                array.push(value);
                array.fmt();
                true
            }
            None => false,
        }
    }

    /// Removes every string element equal to `value`; returns whether
    /// anything was removed.
    pub fn remove_from_array(item: &mut Item, value: &str) -> bool {
        let Some(array) = item.as_array_mut() else {
            return false;
        };
        let before = array.len();
        array.retain(|v| v.as_str() != Some(value));
        array.fmt();
        array.len() != before
    }

    /// Single-line display form of an item, without surrounding decor.
    pub fn display(item: &Item) -> String {
        match item {
            Item::Value(value) => {
                let mut value = value.clone();
                value.decor_mut().clear();
                value.to_string()
            }
            other => other.to_string().trim().to_string(),
        }
    }
}

use std::collections::HashMap;

/// Stores `alias name=value` definitions and expands a command's head word.
///
/// Expansion is single-shot per parsed command: the same alias name cannot
/// expand itself a second time while processing one input line, which
/// terminates cycles like `alias ls=ls` or `alias a=b`/`alias b=a` instead of
/// looping forever. Grounded on the flat array + re-expansion guard used by
/// the original `alias.c`/`parse_line.c`'s `last_alias` tracking.
#[derive(Default, Clone)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.aliases.insert(name.to_string(), value.to_string());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// All aliases sorted by name, for the no-argument `alias` listing.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<(&str, &str)> = self
            .aliases
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.sort_by_key(|(name, _)| *name);
        all
    }

    /// Expand the head word of a command line, repeatedly, until it no
    /// longer names an alias or the same name would expand twice. Returns
    /// the words to splice in place of the head word (possibly more than
    /// one, if the alias value itself has multiple words), or `None` if the
    /// head word is not an alias.
    pub fn expand_head(&self, head: &str) -> Option<String> {
        self.aliases.get(head).cloned()
    }
}

/// Expand a command-head word against the alias table, guarding against
/// self-recursive/cyclic expansion (e.g. `alias ls='ls --color'`).
/// Returns the final replacement text for the head word, or `None` if it
/// was never an alias.
pub fn expand_with_cycle_guard(table: &AliasTable, head: &str) -> Option<String> {
    let mut seen = std::collections::HashSet::new();
    let mut current_head = head.to_string();
    let mut rest = String::new();
    let mut expanded_once = false;

    loop {
        let Some(expansion) = table.expand_head(&current_head) else {
            break;
        };
        if !seen.insert(current_head.clone()) {
            break; // cycle detected — stop with what we've built so far
        }
        expanded_once = true;

        let mut parts = expansion.splitn(2, char::is_whitespace);
        let new_head = parts.next().unwrap_or("").to_string();
        let new_rest = parts.next().unwrap_or("").trim().to_string();
        if !new_rest.is_empty() {
            rest = if rest.is_empty() {
                new_rest
            } else {
                format!("{new_rest} {rest}")
            };
        }

        let should_stop = new_head.is_empty() || new_head == current_head;
        current_head = new_head;
        if should_stop {
            break;
        }
    }

    if !expanded_once {
        return None;
    }
    if rest.is_empty() {
        Some(current_head)
    } else {
        Some(format!("{current_head} {rest}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_alias_expands() {
        let mut t = AliasTable::new();
        t.set("ll", "ls -la");
        assert_eq!(expand_with_cycle_guard(&t, "ll"), Some("ls -la".to_string()));
    }

    #[test]
    fn unknown_head_is_none() {
        let t = AliasTable::new();
        assert_eq!(expand_with_cycle_guard(&t, "ls"), None);
    }

    #[test]
    fn self_referential_alias_terminates() {
        let mut t = AliasTable::new();
        t.set("ls", "ls --color");
        // "ls" expands to "ls --color"; re-expanding head "ls" would cycle, so
        // it stops after one expansion instead of looping forever.
        let result = expand_with_cycle_guard(&t, "ls");
        assert_eq!(result, Some("ls --color".to_string()));
    }

    #[test]
    fn mutual_cycle_terminates() {
        let mut t = AliasTable::new();
        t.set("a", "b");
        t.set("b", "a");
        // Must terminate, not loop forever.
        let result = expand_with_cycle_guard(&t, "a");
        assert!(result.is_some());
    }

    #[test]
    fn chained_alias_expands_transitively() {
        let mut t = AliasTable::new();
        t.set("g", "git");
        t.set("gs", "g status");
        let result = expand_with_cycle_guard(&t, "gs");
        assert_eq!(result, Some("g status".to_string()));
    }

    #[test]
    fn remove_alias() {
        let mut t = AliasTable::new();
        t.set("x", "y");
        assert!(t.remove("x"));
        assert!(!t.remove("x"));
    }
}

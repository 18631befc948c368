/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The label table built by assembler pass 1: an ordered, name-unique set
//! of `(name, instruction address)` pairs.

use std::collections::HashMap;

use crate::error::AssemblyError;

#[derive(Debug, Default)]
pub struct SymbolTable {
    addresses: HashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    pub fn define(&mut self, name: &str, address: u32, line: usize) -> Result<(), AssemblyError> {
        if self.addresses.contains_key(name) {
            return Err(AssemblyError::DuplicateLabel {
                line,
                name: name.to_string(),
            });
        }
        self.addresses.insert(name.to_string(), address);
        Ok(())
    }

    pub fn resolve(&self, name: &str, line: usize) -> Result<u32, AssemblyError> {
        self.addresses
            .get(name)
            .copied()
            .ok_or_else(|| AssemblyError::UnknownLabel {
                line,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_a_defined_label() {
        let mut table = SymbolTable::new();
        table.define("LOOP", 3, 1).unwrap();
        assert_eq!(table.resolve("LOOP", 5).unwrap(), 3);
    }

    #[test]
    fn rejects_duplicate_definitions() {
        let mut table = SymbolTable::new();
        table.define("LOOP", 3, 1).unwrap();
        assert!(matches!(
            table.define("LOOP", 9, 2),
            Err(AssemblyError::DuplicateLabel { .. })
        ));
    }

    #[test]
    fn unknown_label_is_reported_with_the_referencing_line() {
        let table = SymbolTable::new();
        assert!(matches!(
            table.resolve("MISSING", 7),
            Err(AssemblyError::UnknownLabel { line: 7, .. })
        ));
    }
}

//! Conjunctions and the resolvables they decompose into.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::concept::Variable;
use crate::error::PatternError;
use crate::logic::RuleIndex;
use crate::resolution::mapping::Mapping;

use super::{Atom, Rule, canonicalize, split_top_level};

// ---------------------------------------------------------------------------
// Conjunction
// ---------------------------------------------------------------------------

/// A set of atoms that must all hold for a binding to match.
///
/// Atoms keep their source order; exact duplicates are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Conjunction {
    atoms: Vec<Atom>,
}

impl Conjunction {
    pub fn new(atoms: impl IntoIterator<Item = Atom>) -> Result<Self, PatternError> {
        let mut unique: Vec<Atom> = Vec::new();
        for atom in atoms {
            if !unique.contains(&atom) {
                unique.push(atom);
            }
        }
        if unique.is_empty() {
            return Err(PatternError::EmptyConjunction);
        }
        Ok(Self { atoms: unique })
    }

    /// Parse `a(?x), b(?x, c)`.
    pub fn parse(s: &str) -> Result<Self, PatternError> {
        let atoms = split_top_level(s.trim(), ',')
            .into_iter()
            .filter(|part| !part.trim().is_empty())
            .map(Atom::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(atoms)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Distinct variables in order of first appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen: Vec<Variable> = Vec::new();
        for v in self.atoms.iter().flat_map(Atom::variables) {
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen
    }

    /// Split into the sub-goals a resolver plans over.
    ///
    /// Atoms with at least one applicable rule become concludables; the rest
    /// are grouped into retrievables, one per connected component of shared
    /// variables. The result is ordered by the position of each resolvable's
    /// first atom in this conjunction.
    pub fn resolvables(&self, rules: &dyn RuleIndex) -> Vec<Resolvable> {
        let mut planned: Vec<(usize, Resolvable)> = Vec::new();
        let mut retrievable_atoms: Vec<usize> = Vec::new();

        for (i, atom) in self.atoms.iter().enumerate() {
            let concludable = Concludable::new(atom.clone());
            if concludable.applicable_rules(rules).is_empty() {
                retrievable_atoms.push(i);
            } else {
                planned.push((i, Resolvable::Concludable(concludable)));
            }
        }

        for component in self.components(&retrievable_atoms) {
            let first = component[0];
            let atoms = component.iter().map(|&i| self.atoms[i].clone());
            let conjunction = Conjunction {
                atoms: atoms.collect(),
            };
            planned.push((first, Resolvable::Retrievable(Retrievable::new(conjunction))));
        }

        planned.sort_by_key(|(first, _)| *first);
        planned.into_iter().map(|(_, r)| r).collect()
    }

    /// Connected components (by shared variables) of the given atom indices.
    fn components(&self, indices: &[usize]) -> Vec<Vec<usize>> {
        let mut parent: Vec<usize> = (0..indices.len()).collect();
        fn find(parent: &mut [usize], i: usize) -> usize {
            let mut root = i;
            while parent[root] != root {
                root = parent[root];
            }
            parent[i] = root;
            root
        }

        let mut owner: BTreeMap<Variable, usize> = BTreeMap::new();
        for (slot, &i) in indices.iter().enumerate() {
            for v in self.atoms[i].variables() {
                match owner.get(&v) {
                    Some(&other) => {
                        let (a, b) = (find(&mut parent, slot), find(&mut parent, other));
                        parent[a.max(b)] = a.min(b);
                    }
                    None => {
                        owner.insert(v, slot);
                    }
                }
            }
        }

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for slot in 0..indices.len() {
            let root = find(&mut parent, slot);
            groups.entry(root).or_default().push(indices[slot]);
        }
        groups.into_values().collect()
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Concludable
// ---------------------------------------------------------------------------

/// An atom that some rule's head may produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Concludable {
    atom: Atom,
}

impl Concludable {
    pub fn new(atom: Atom) -> Self {
        Self { atom }
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// Rules whose head unifies with this concludable, with the unifier
    /// mapping concludable variables onto head variables.
    pub fn applicable_rules(&self, rules: &dyn RuleIndex) -> Vec<(Arc<Rule>, Mapping)> {
        rules
            .applicable_rules(self)
            .into_iter()
            .filter_map(|rule| {
                let unifier = Mapping::unify(&self.atom, rule.then())?;
                Some((rule, unifier))
            })
            .collect()
    }

    /// Alpha-normalised form plus the renaming from this concludable's
    /// variables to the canonical ones.
    pub fn canonical(&self) -> (Concludable, BTreeMap<Variable, Variable>) {
        let (mut atoms, renaming) = canonicalize(std::slice::from_ref(&self.atom));
        (Concludable::new(atoms.remove(0)), renaming)
    }

    pub fn as_conjunction(&self) -> Conjunction {
        Conjunction {
            atoms: vec![self.atom.clone()],
        }
    }
}

impl fmt::Display for Concludable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.atom)
    }
}

// ---------------------------------------------------------------------------
// Retrievable
// ---------------------------------------------------------------------------

/// A connected group of atoms answered from stored facts only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Retrievable {
    conjunction: Conjunction,
}

impl Retrievable {
    pub fn new(conjunction: Conjunction) -> Self {
        Self { conjunction }
    }

    pub fn conjunction(&self) -> &Conjunction {
        &self.conjunction
    }

    pub fn canonical(&self) -> (Retrievable, BTreeMap<Variable, Variable>) {
        let (atoms, renaming) = canonicalize(&self.conjunction.atoms);
        (Retrievable::new(Conjunction { atoms }), renaming)
    }
}

impl fmt::Display for Retrievable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.conjunction)
    }
}

// ---------------------------------------------------------------------------
// Resolvable
// ---------------------------------------------------------------------------

/// A sub-goal a resolver can be registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Resolvable {
    Concludable(Concludable),
    Retrievable(Retrievable),
}

impl fmt::Display for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concludable(c) => write!(f, "Concludable({c})"),
            Self::Retrievable(r) => write!(f, "Retrievable({r})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::RuleSet;

    fn rules(defs: &[&str]) -> RuleSet {
        let mut set = RuleSet::new();
        for def in defs {
            set.add(Rule::parse(def).unwrap()).unwrap();
        }
        set
    }

    #[test]
    fn parse_drops_duplicate_atoms() {
        let conj = Conjunction::parse("p(?x), q(?x, ?y), p(?x)").unwrap();
        assert_eq!(conj.atoms().len(), 2);
        assert_eq!(conj.to_string(), "p(?x), q(?x, ?y)");
    }

    #[test]
    fn empty_conjunction_is_rejected() {
        assert!(matches!(
            Conjunction::parse("  "),
            Err(PatternError::EmptyConjunction)
        ));
    }

    #[test]
    fn resolvables_split_concludables_from_retrievables() {
        let set = rules(&["r: q(?x) :- p(?x)"]);
        let conj = Conjunction::parse("p(?x), q(?x), s(?y), t(?x, ?z)").unwrap();
        let resolvables = conj.resolvables(&set);

        assert_eq!(resolvables.len(), 3);
        match &resolvables[0] {
            Resolvable::Retrievable(r) => assert_eq!(r.to_string(), "p(?x), t(?x, ?z)"),
            other => panic!("expected retrievable, got {other}"),
        }
        assert!(matches!(&resolvables[1], Resolvable::Concludable(c) if c.to_string() == "q(?x)"));
        assert!(matches!(&resolvables[2], Resolvable::Retrievable(r) if r.to_string() == "s(?y)"));
    }

    #[test]
    fn concludable_without_unifiable_rule_is_retrievable() {
        let set = rules(&["r: q(a) :- p(a)"]);
        let conj = Conjunction::parse("q(b)").unwrap();
        assert!(matches!(
            conj.resolvables(&set).as_slice(),
            [Resolvable::Retrievable(_)]
        ));
    }
}

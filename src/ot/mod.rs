//! Text operational transform over a sequence of atoms (specification §4.7).

use serde::{Deserialize, Serialize};

/// One atom of an operation: retain `n` items, delete `n` items, or insert
/// `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Atom<T> {
    /// Copy the next `n` items from the input unchanged.
    Retain(usize),
    /// Skip the next `n` items of the input.
    Delete(usize),
    /// Append `items` to the output without consuming any input.
    Insert(Vec<T>),
}

/// A sequence of atoms describing a transformation of one sequence into
/// another. Construct via [`Operation::coalesced`] (or push atoms with
/// [`Operation::push`], which coalesces as it goes) to maintain the RORO
/// invariant atoms must satisfy to compose/transform correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation<T> {
    atoms: Vec<Atom<T>>,
}

impl<T: Clone + PartialEq> Operation<T> {
    /// The empty operation.
    pub fn new() -> Self {
        Self { atoms: Vec::new() }
    }

    /// Push an atom, maintaining the RORO invariant regardless of the
    /// order atoms arrive in: adjacent same-kind atoms merge
    /// (`Retain+Retain`, `Delete+Delete`, `Insert+Insert`), and a
    /// non-retain atom merges into the matching atom already open in the
    /// current block (the run of non-retain atoms since the last
    /// `Retain`) even if another kind sits between them — deletes and
    /// inserts within one block don't interact (a delete consumes no
    /// output, an insert consumes no input), so merging is
    /// apply-equivalent to appending. Zero-length atoms are dropped.
    pub fn push(&mut self, atom: Atom<T>) {
        if Self::is_empty_atom(&atom) {
            return;
        }
        if let Atom::Retain(n) = atom {
            if let Some(Atom::Retain(a)) = self.atoms.last_mut() {
                *a += n;
                return;
            }
            self.atoms.push(Atom::Retain(n));
            return;
        }
        self.merge_into_current_block(atom);
    }

    /// Merge a `Delete`/`Insert` atom into the matching atom already
    /// present in the current block, or append it as a new block entry.
    fn merge_into_current_block(&mut self, atom: Atom<T>) {
        let mut block_start = self.atoms.len();
        while block_start > 0 && !matches!(self.atoms[block_start - 1], Atom::Retain(_)) {
            block_start -= 1;
        }
        for existing in &mut self.atoms[block_start..] {
            match (existing, &atom) {
                (Atom::Delete(a), Atom::Delete(b)) => {
                    *a += b;
                    return;
                }
                (Atom::Insert(a), Atom::Insert(b)) => {
                    a.extend(b.iter().cloned());
                    return;
                }
                _ => {}
            }
        }
        self.atoms.push(atom);
    }

    fn is_empty_atom(atom: &Atom<T>) -> bool {
        matches!(atom, Atom::Retain(0) | Atom::Delete(0)) || matches!(atom, Atom::Insert(v) if v.is_empty())
    }

    /// Build a coalesced operation from a raw atom sequence.
    pub fn coalesced(atoms: impl IntoIterator<Item = Atom<T>>) -> Self {
        let mut op = Self::new();
        for atom in atoms {
            op.push(atom);
        }
        op
    }

    /// Raw atom sequence, for tests and serialization edge cases.
    pub fn atoms(&self) -> &[Atom<T>] {
        &self.atoms
    }

    /// Number of items this operation expects to consume.
    pub fn input_size(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| match a {
                Atom::Retain(n) | Atom::Delete(n) => *n,
                Atom::Insert(_) => 0,
            })
            .sum()
    }

    /// Number of items this operation produces.
    pub fn output_size(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| match a {
                Atom::Retain(n) => *n,
                Atom::Delete(_) => 0,
                Atom::Insert(items) => items.len(),
            })
            .sum()
    }

    /// Validate the RORO invariant: every maximal run of non-retain atoms
    /// contains at most one `Insert` and at most one `Delete` (so at most
    /// length 2), and consecutive such runs are separated by a `Retain`.
    pub fn is_valid_roro(&self) -> bool {
        let mut i = 0;
        while i < self.atoms.len() {
            if matches!(self.atoms[i], Atom::Retain(_)) {
                i += 1;
                continue;
            }
            let mut has_insert = false;
            let mut has_delete = false;
            let mut block_len = 0;
            while i < self.atoms.len() && !matches!(self.atoms[i], Atom::Retain(_)) {
                match &self.atoms[i] {
                    Atom::Insert(_) => {
                        if has_insert {
                            return false;
                        }
                        has_insert = true;
                    }
                    Atom::Delete(_) => {
                        if has_delete {
                            return false;
                        }
                        has_delete = true;
                    }
                    Atom::Retain(_) => unreachable!(),
                }
                block_len += 1;
                i += 1;
            }
            if block_len > 2 {
                return false;
            }
        }
        true
    }

    /// Apply this operation to `input`, consuming it by atoms.
    ///
    /// Fails if `input.len() != self.input_size()`.
    pub fn apply(&self, input: &[T]) -> Result<Vec<T>, String> {
        if input.len() != self.input_size() {
            return Err(format!(
                "input length {} disagrees with operation's input size {}",
                input.len(),
                self.input_size()
            ));
        }
        let mut output = Vec::with_capacity(self.output_size());
        let mut cursor = 0usize;
        for atom in &self.atoms {
            match atom {
                Atom::Retain(n) => {
                    output.extend_from_slice(&input[cursor..cursor + n]);
                    cursor += n;
                }
                Atom::Delete(n) => {
                    cursor += n;
                }
                Atom::Insert(items) => {
                    output.extend(items.iter().cloned());
                }
            }
        }
        Ok(output)
    }

    /// Produce the operation such that `inverse(op).apply(op.apply(input)) == input`.
    pub fn inverse(&self, input: &[T]) -> Operation<T> {
        let mut inv = Operation::new();
        let mut cursor = 0usize;
        for atom in &self.atoms {
            match atom {
                Atom::Retain(n) => {
                    inv.push(Atom::Retain(*n));
                    cursor += n;
                }
                Atom::Insert(items) => {
                    inv.push(Atom::Delete(items.len()));
                }
                Atom::Delete(n) => {
                    inv.push(Atom::Insert(input[cursor..cursor + n].to_vec()));
                    cursor += n;
                }
            }
        }
        inv
    }

    /// Compose `self` (`a`) then `other` (`b`), such that
    /// `compose(a,b).apply(i) == b.apply(a.apply(i)?)?`.
    ///
    /// Requires `self.output_size() == other.input_size()`.
    pub fn compose(&self, other: &Operation<T>) -> Result<Operation<T>, String> {
        if self.output_size() != other.input_size() {
            return Err(format!(
                "compose size mismatch: a.outputSize={} b.inputSize={}",
                self.output_size(),
                other.input_size()
            ));
        }
        let mut a = Cursor::new(&self.atoms);
        let mut b = Cursor::new(&other.atoms);
        let mut result = Operation::new();

        loop {
            match (a.take(), b.take()) {
                (None, None) => break,
                (Some(Atom::Delete(n)), op2) => {
                    result.push(Atom::Delete(n));
                    b.put_back(op2);
                }
                (op1, Some(Atom::Insert(items))) => {
                    result.push(Atom::Insert(items));
                    a.put_back(op1);
                }
                (Some(Atom::Retain(ra)), Some(Atom::Retain(rb))) => {
                    let n = ra.min(rb);
                    result.push(Atom::Retain(n));
                    a.put_back(remainder_retain(ra, n));
                    b.put_back(remainder_retain(rb, n));
                }
                (Some(Atom::Insert(items)), Some(Atom::Retain(rb))) => {
                    let n = items.len().min(rb);
                    result.push(Atom::Insert(items[..n].to_vec()));
                    a.put_back(remainder_insert(items, n));
                    b.put_back(remainder_retain(rb, n));
                }
                (Some(Atom::Insert(items)), Some(Atom::Delete(db))) => {
                    let n = items.len().min(db);
                    // the inserted slice covered by b's delete cancels out
                    a.put_back(remainder_insert(items, n));
                    b.put_back(remainder_delete(db, n));
                }
                (Some(Atom::Retain(ra)), Some(Atom::Delete(db))) => {
                    let n = ra.min(db);
                    result.push(Atom::Delete(n));
                    a.put_back(remainder_retain(ra, n));
                    b.put_back(remainder_delete(db, n));
                }
                (None, Some(op2)) => return Err(format!("compose ran past a's output at {op2:?}")),
                (Some(op1), None) => return Err(format!("compose ran past b's input at {op1:?}")),
            }
        }
        Ok(result)
    }

    /// Transform `self` (`a`) against `other` (`b`), producing `(a', b')`
    /// such that `b'.apply(a.apply(i)?)? == a'.apply(b.apply(i)?)?` for
    /// every input both are applicable to.
    ///
    /// Requires `self.input_size() == other.input_size()`. When both
    /// operations insert at the same position, `a`'s atom is consumed
    /// first (checked before `b`'s in the loop below), which is what
    /// places `a`'s insertion first in both derived results — the
    /// convention applies symmetrically because the same tie-break runs
    /// whichever operation happens to be passed as `self`.
    pub fn transform(&self, other: &Operation<T>) -> Result<(Operation<T>, Operation<T>), String> {
        if self.input_size() != other.input_size() {
            return Err(format!(
                "transform size mismatch: a.inputSize={} b.inputSize={}",
                self.input_size(),
                other.input_size()
            ));
        }
        let mut a = Cursor::new(&self.atoms);
        let mut b = Cursor::new(&other.atoms);
        let mut a_prime = Operation::new();
        let mut b_prime = Operation::new();

        loop {
            match (a.take(), b.take()) {
                (None, None) => break,
                (Some(Atom::Insert(items)), op2) => {
                    a_prime.push(Atom::Insert(items.clone()));
                    b_prime.push(Atom::Retain(items.len()));
                    b.put_back(op2);
                }
                (op1, Some(Atom::Insert(items))) => {
                    a_prime.push(Atom::Retain(items.len()));
                    b_prime.push(Atom::Insert(items.clone()));
                    a.put_back(op1);
                }
                (Some(Atom::Retain(ra)), Some(Atom::Retain(rb))) => {
                    let n = ra.min(rb);
                    a_prime.push(Atom::Retain(n));
                    b_prime.push(Atom::Retain(n));
                    a.put_back(remainder_retain(ra, n));
                    b.put_back(remainder_retain(rb, n));
                }
                (Some(Atom::Delete(da)), Some(Atom::Delete(db))) => {
                    let n = da.min(db);
                    a.put_back(remainder_delete(da, n));
                    b.put_back(remainder_delete(db, n));
                }
                (Some(Atom::Delete(da)), Some(Atom::Retain(rb))) => {
                    let n = da.min(rb);
                    a_prime.push(Atom::Delete(n));
                    a.put_back(remainder_delete(da, n));
                    b.put_back(remainder_retain(rb, n));
                }
                (Some(Atom::Retain(ra)), Some(Atom::Delete(db))) => {
                    let n = ra.min(db);
                    b_prime.push(Atom::Delete(n));
                    a.put_back(remainder_retain(ra, n));
                    b.put_back(remainder_delete(db, n));
                }
                (None, Some(op2)) => return Err(format!("transform operands disagree in length at {op2:?}")),
                (Some(op1), None) => return Err(format!("transform operands disagree in length at {op1:?}")),
            }
        }
        Ok((a_prime, b_prime))
    }
}

impl<T: Clone + PartialEq> Default for Operation<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn remainder_retain<T>(n: usize, consumed: usize) -> Option<Atom<T>> {
    (n > consumed).then(|| Atom::Retain(n - consumed))
}

fn remainder_delete<T>(n: usize, consumed: usize) -> Option<Atom<T>> {
    (n > consumed).then(|| Atom::Delete(n - consumed))
}

fn remainder_insert<T: Clone>(items: Vec<T>, consumed: usize) -> Option<Atom<T>> {
    (items.len() > consumed).then(|| Atom::Insert(items[consumed..].to_vec()))
}

/// Walks an atom slice one logical atom at a time, supporting "put back a
/// partially-consumed remainder" so `compose`/`transform` can split runs
/// without flattening them to per-item granularity.
struct Cursor<'a, T> {
    atoms: &'a [Atom<T>],
    index: usize,
    pending: Option<Atom<T>>,
}

impl<'a, T: Clone> Cursor<'a, T> {
    fn new(atoms: &'a [Atom<T>]) -> Self {
        Self { atoms, index: 0, pending: None }
    }

    fn take(&mut self) -> Option<Atom<T>> {
        if let Some(atom) = self.pending.take() {
            return Some(atom);
        }
        let atom = self.atoms.get(self.index)?.clone();
        self.index += 1;
        Some(atom)
    }

    fn put_back(&mut self, atom: Option<Atom<T>>) {
        self.pending = atom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retain(n: usize) -> Atom<char> {
        Atom::Retain(n)
    }
    fn delete(n: usize) -> Atom<char> {
        Atom::Delete(n)
    }
    fn insert(s: &str) -> Atom<char> {
        Atom::Insert(s.chars().collect())
    }

    fn text(op: &Operation<char>, input: &str) -> String {
        op.apply(&input.chars().collect::<Vec<_>>()).unwrap().into_iter().collect()
    }

    #[test]
    fn adjacent_same_kind_atoms_coalesce() {
        let op = Operation::coalesced([retain(3), retain(4), delete(1)]);
        assert_eq!(op.input_size(), 8);
        assert_eq!(op.atoms().len(), 2);
    }

    #[test]
    fn non_adjacent_same_kind_atoms_in_one_block_still_merge() {
        // insert, delete, insert with no intervening retain: the second
        // insert belongs to the same block as the first, so construction
        // must merge them to stay RORO-compliant.
        let op = Operation::coalesced([insert("a"), delete(1), insert("b")]);
        assert!(op.is_valid_roro());
        assert_eq!(op.atoms().len(), 2);
        assert_eq!(text(&op, "x"), "ab");
    }

    #[test]
    fn apply_retains_deletes_and_inserts() {
        let op = Operation::coalesced([retain(1), delete(1), insert("E"), retain(3)]);
        assert_eq!(text(&op, "hello"), "hEllo");
    }

    #[test]
    fn apply_fails_on_input_size_mismatch() {
        let op = Operation::coalesced([retain(5)]);
        assert!(op.apply(&['a', 'b']).is_err());
    }

    #[test]
    fn inverse_undoes_insert_and_delete() {
        let input: Vec<char> = "hello".chars().collect();
        let op = Operation::coalesced([retain(1), delete(1), insert("E"), retain(3)]);
        let output = op.apply(&input).unwrap();
        let inv = op.inverse(&input);
        assert_eq!(inv.apply(&output).unwrap(), input);
    }

    #[test]
    fn roro_accepts_single_delete_then_insert_block() {
        let valid = Operation::coalesced([retain(2), delete(1), insert("x"), retain(2)]);
        assert!(valid.is_valid_roro());
    }

    #[test]
    fn roro_rejects_two_inserts_in_one_block() {
        let op = Operation { atoms: vec![Atom::Insert(vec!['a']), Atom::Insert(vec!['b'])] };
        assert!(!op.is_valid_roro());
    }

    #[test]
    fn compose_matches_sequential_application() {
        let a = Operation::coalesced([retain(1), insert("X"), retain(4)]);
        let b = Operation::coalesced([delete(1), retain(5)]);
        let c = a.compose(&b).unwrap();
        let input: Vec<char> = "hello".chars().collect();
        let via_c = c.apply(&input).unwrap();
        let via_sequential = b.apply(&a.apply(&input).unwrap()).unwrap();
        assert_eq!(via_c, via_sequential);
    }

    #[test]
    fn transform_satisfies_the_diamond_property() {
        let a = Operation::coalesced([retain(2), insert("A"), retain(3)]);
        let b = Operation::coalesced([retain(5), insert("B")]);
        let (a_prime, b_prime) = a.transform(&b).unwrap();
        let input: Vec<char> = "hello".chars().collect();
        let left = b_prime.apply(&a.apply(&input).unwrap()).unwrap();
        let right = a_prime.apply(&b.apply(&input).unwrap()).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn simultaneous_inserts_place_a_first() {
        let a = Operation::coalesced([retain(2), insert("A"), retain(3)]);
        let b = Operation::coalesced([retain(2), insert("B"), retain(3)]);
        let (a_prime, b_prime) = a.transform(&b).unwrap();
        let input: Vec<char> = "hello".chars().collect();
        let left = b_prime.apply(&a.apply(&input).unwrap()).unwrap();
        let right = a_prime.apply(&b.apply(&input).unwrap()).unwrap();
        assert_eq!(left, right);
        // a's insertion lands before b's in the merged result.
        assert_eq!(left.iter().collect::<String>(), "heABllo");
    }

    #[test]
    fn compose_requires_matching_sizes() {
        let a = Operation::coalesced([retain(3)]);
        let b = Operation::coalesced([retain(5)]);
        assert!(a.compose(&b).is_err());
    }
}

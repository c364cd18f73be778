//! Reduced, ordered binary decision diagrams with shared nodes.
//!
//! A [`Manager`] owns every node over a fixed universe of variables; a [`Func`]
//! is a counted handle to one root node. Handles keep their nodes alive: a
//! node with no handle reaching it is reclaimed by the next garbage collection,
//! which only ever runs between top-level operations. Variable order can be
//! changed by sifting, which rewrites nodes in place so that every live handle
//! keeps both its node id and the function it denotes.

use std::{
    cell::{ Ref, RefCell },
    fmt,
    hash::{ Hash, Hasher },
    ops::{ BitAnd, BitOr, BitXor, Not },
    rc::Rc,
};
use rustc_hash::{ FxHashMap, FxHashSet };

/// Index of a node within its [`Manager`].
pub type NodeId = u32;

const FALSE: NodeId = 0;
const TRUE: NodeId = 1;
const TERMINAL: u32 = u32::MAX;
const FREED: u32 = u32::MAX - 1;

const MIN_GC_THRESHOLD: usize = 1 << 14;
const MIN_REORDER_THRESHOLD: usize = 1 << 12;
const MAX_SIFT_GROWTH: f64 = 1.2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Node {
    var: u32,
    lo: NodeId,
    hi: NodeId,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum OpKey {
    And,
    Or,
    Xor,
    Restrict(u32, bool),
}

#[derive(Debug)]
struct Store {
    nvars: usize,
    nodes: Vec<Node>,
    refs: Vec<u32>,
    free: Vec<NodeId>,
    unique: FxHashMap<(u32, NodeId, NodeId), NodeId>,
    cache: FxHashMap<(OpKey, NodeId, NodeId), NodeId>,
    var2level: Vec<u32>,
    level2var: Vec<u32>,
    gc_threshold: usize,
    auto_reorder: bool,
    reorder_threshold: usize,
    peak: usize,
    generation: u64,
    collections: u64,
}

/* Store *********************************************************************/

impl Store {
    fn new(nvars: usize) -> Self {
        let order: Vec<u32> = (0..nvars as u32).collect();
        Self {
            nvars,
            nodes: vec![
                Node { var: TERMINAL, lo: FALSE, hi: FALSE },
                Node { var: TERMINAL, lo: TRUE, hi: TRUE },
            ],
            refs: vec![0, 0],
            free: Vec::new(),
            unique: FxHashMap::default(),
            cache: FxHashMap::default(),
            var2level: order.clone(),
            level2var: order,
            gc_threshold: MIN_GC_THRESHOLD,
            auto_reorder: false,
            reorder_threshold: MIN_REORDER_THRESHOLD,
            peak: 0,
            generation: 0,
            collections: 0,
        }
    }

    fn allocated(&self) -> usize { self.nodes.len() - self.free.len() - 2 }

    fn level(&self, id: NodeId) -> usize {
        match self.nodes[id as usize].var {
            TERMINAL => self.nvars,
            var => self.var2level[var as usize] as usize,
        }
    }

    fn cofactors(&self, id: NodeId, level: usize) -> (NodeId, NodeId) {
        if self.level(id) == level {
            let Node { lo, hi, .. } = self.nodes[id as usize];
            (lo, hi)
        } else {
            (id, id)
        }
    }

    fn mk(&mut self, var: u32, lo: NodeId, hi: NodeId) -> NodeId {
        if lo == hi { return lo; }
        if let Some(&id) = self.unique.get(&(var, lo, hi)) { return id; }
        let node = Node { var, lo, hi };
        let id
            = if let Some(id) = self.free.pop() {
                self.nodes[id as usize] = node;
                self.refs[id as usize] = 0;
                id
            } else {
                self.nodes.push(node);
                self.refs.push(0);
                (self.nodes.len() - 1) as NodeId
            };
        self.unique.insert((var, lo, hi), id);
        self.peak = self.peak.max(self.allocated());
        id
    }

    fn apply(&mut self, op: OpKey, f: NodeId, g: NodeId) -> NodeId {
        match op {
            OpKey::And => {
                if f == FALSE || g == FALSE { return FALSE; }
                if f == TRUE { return g; }
                if g == TRUE || f == g { return f; }
            },
            OpKey::Or => {
                if f == TRUE || g == TRUE { return TRUE; }
                if f == FALSE { return g; }
                if g == FALSE || f == g { return f; }
            },
            OpKey::Xor => {
                if f == g { return FALSE; }
                if f == FALSE { return g; }
                if g == FALSE { return f; }
            },
            OpKey::Restrict(..) => unreachable!("restrict is not a binary apply"),
        }
        // all three operations are commutative
        let (f, g) = if f <= g { (f, g) } else { (g, f) };
        if let Some(&r) = self.cache.get(&(op, f, g)) { return r; }
        let top = self.level(f).min(self.level(g));
        let var = self.level2var[top];
        let (f0, f1) = self.cofactors(f, top);
        let (g0, g1) = self.cofactors(g, top);
        let lo = self.apply(op, f0, g0);
        let hi = self.apply(op, f1, g1);
        let r = self.mk(var, lo, hi);
        self.cache.insert((op, f, g), r);
        r
    }

    fn restrict(&mut self, f: NodeId, var: u32, value: bool) -> NodeId {
        if f <= TRUE { return f; }
        if self.level(f) > self.var2level[var as usize] as usize {
            return f;
        }
        let node = self.nodes[f as usize];
        if node.var == var {
            return if value { node.hi } else { node.lo };
        }
        let key = (OpKey::Restrict(var, value), f, FALSE);
        if let Some(&r) = self.cache.get(&key) { return r; }
        let lo = self.restrict(node.lo, var, value);
        let hi = self.restrict(node.hi, var, value);
        let r = self.mk(node.var, lo, hi);
        self.cache.insert(key, r);
        r
    }

    fn collect(&mut self) {
        let mut marked = vec![false; self.nodes.len()];
        marked[FALSE as usize] = true;
        marked[TRUE as usize] = true;
        let mut stack: Vec<NodeId>
            = self.refs.iter().enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id as NodeId)
            .collect();
        while let Some(id) = stack.pop() {
            if marked[id as usize] { continue; }
            marked[id as usize] = true;
            let Node { lo, hi, .. } = self.nodes[id as usize];
            stack.push(lo);
            stack.push(hi);
        }
        for (id, node) in self.nodes.iter_mut().enumerate().skip(2) {
            if !marked[id] && node.var != FREED {
                self.unique.remove(&(node.var, node.lo, node.hi));
                node.var = FREED;
                self.free.push(id as NodeId);
            }
        }
        self.cache.clear();
        self.collections += 1;
        self.gc_threshold = (2 * self.allocated()).max(MIN_GC_THRESHOLD);
    }

    fn maybe_collect(&mut self) {
        if self.allocated() >= self.gc_threshold { self.collect(); }
    }

    // exchange the variables at `level` and `level + 1`, rewriting every node
    // of the upper variable in place
    fn swap_levels(&mut self, level: usize) {
        let x = self.level2var[level];
        let y = self.level2var[level + 1];
        let upper: Vec<NodeId>
            = self.nodes.iter().enumerate()
            .filter(|(_, node)| node.var == x)
            .map(|(id, _)| id as NodeId)
            .collect();
        self.level2var.swap(level, level + 1);
        self.var2level[x as usize] = (level + 1) as u32;
        self.var2level[y as usize] = level as u32;
        for f in upper {
            let Node { lo: f0, hi: f1, .. } = self.nodes[f as usize];
            let n0 = self.nodes[f0 as usize];
            let n1 = self.nodes[f1 as usize];
            if n0.var != y && n1.var != y { continue; }
            let (f00, f01) = if n0.var == y { (n0.lo, n0.hi) } else { (f0, f0) };
            let (f10, f11) = if n1.var == y { (n1.lo, n1.hi) } else { (f1, f1) };
            let lo = self.mk(x, f00, f10);
            let hi = self.mk(x, f01, f11);
            self.unique.remove(&(x, f0, f1));
            self.nodes[f as usize] = Node { var: y, lo, hi };
            self.unique.insert((y, lo, hi), f);
        }
    }

    fn sift_var(&mut self, var: u32) {
        let start = self.allocated();
        let limit = ((start as f64) * MAX_SIFT_GROWTH).ceil() as usize;
        let mut best = (start, self.var2level[var as usize] as usize);
        while (self.var2level[var as usize] as usize) + 1 < self.nvars {
            let level = self.var2level[var as usize] as usize;
            self.swap_levels(level);
            self.collect();
            let size = self.allocated();
            if size < best.0 { best = (size, level + 1); }
            if size > limit { break; }
        }
        while self.var2level[var as usize] > 0 {
            let level = self.var2level[var as usize] as usize;
            self.swap_levels(level - 1);
            self.collect();
            let size = self.allocated();
            if size < best.0 { best = (size, level - 1); }
            if size > limit { break; }
        }
        while (self.var2level[var as usize] as usize) < best.1 {
            let level = self.var2level[var as usize] as usize;
            self.swap_levels(level);
        }
        while (self.var2level[var as usize] as usize) > best.1 {
            let level = self.var2level[var as usize] as usize;
            self.swap_levels(level - 1);
        }
        self.collect();
    }

    fn sift(&mut self) {
        self.collect();
        if self.nvars >= 2 {
            let mut counts = vec![0_usize; self.nvars];
            self.nodes.iter().skip(2)
                .filter(|node| node.var != FREED)
                .for_each(|node| { counts[node.var as usize] += 1; });
            let mut order: Vec<u32> = (0..self.nvars as u32).collect();
            order.sort_by(|a, b| counts[*b as usize].cmp(&counts[*a as usize]));
            for var in order {
                if counts[var as usize] == 0 { continue; }
                self.sift_var(var);
            }
        }
        self.generation += 1;
        self.reorder_threshold
            = (2 * self.allocated()).max(MIN_REORDER_THRESHOLD);
    }
}

/* Manager *******************************************************************/

/// Owner of a shared node store over a fixed number of variables.
///
/// Cloning a `Manager` yields another reference to the same store.
#[derive(Clone)]
pub struct Manager {
    store: Rc<RefCell<Store>>,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let store = self.store.borrow();
        f.debug_struct("Manager")
            .field("nvars", &store.nvars)
            .field("nodes", &store.allocated())
            .field("generation", &store.generation)
            .finish()
    }
}

/// Shape of a single node, as seen through [`View::node`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeView {
    Const(bool),
    Branch { var: usize, lo: NodeId, hi: NodeId },
}

impl Manager {
    /// Create a new manager over variables `0..nvars`, initially ordered by
    /// index.
    pub fn new(nvars: usize) -> Self {
        Self { store: Rc::new(RefCell::new(Store::new(nvars))) }
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize { self.store.borrow().nvars }

    fn wrap(&self, id: NodeId) -> Func { Func::new(Rc::clone(&self.store), id) }

    /// The constant function `value`.
    pub fn constant(&self, value: bool) -> Func {
        self.wrap(if value { TRUE } else { FALSE })
    }

    /// The constant-true function.
    pub fn tt(&self) -> Func { self.constant(true) }

    /// The constant-false function.
    pub fn ff(&self) -> Func { self.constant(false) }

    /// The positive literal of variable `k`.
    ///
    /// *Panics if `k` is out of range.*
    pub fn var(&self, k: usize) -> Func { self.literal(k, true) }

    /// The negative literal of variable `k`.
    ///
    /// *Panics if `k` is out of range.*
    pub fn nvar(&self, k: usize) -> Func { self.literal(k, false) }

    /// The literal of variable `k` with polarity `positive`.
    ///
    /// *Panics if `k` is out of range.*
    pub fn literal(&self, k: usize, positive: bool) -> Func {
        let id = {
            let mut store = self.store.borrow_mut();
            if k >= store.nvars {
                panic!("Manager::literal: variable {} out of range", k);
            }
            store.maybe_collect();
            let (lo, hi) = if positive { (FALSE, TRUE) } else { (TRUE, FALSE) };
            store.mk(k as u32, lo, hi)
        };
        self.wrap(id)
    }

    /// Conjunction of literals, one per `(variable, polarity)` pair.
    pub fn cube<I>(&self, literals: I) -> Func
    where I: IntoIterator<Item = (usize, bool)>
    {
        literals.into_iter()
            .fold(self.tt(), |acc, (k, pos)| acc.and(&self.literal(k, pos)))
    }

    /// Number of nodes currently held, including garbage not yet reclaimed.
    pub fn node_count(&self) -> usize { self.store.borrow().allocated() }

    /// Largest value [`node_count`][Self::node_count] has ever taken.
    pub fn peak_node_count(&self) -> usize { self.store.borrow().peak }

    /// Reclaim every node not reachable from a live handle.
    pub fn collect_garbage(&self) { self.store.borrow_mut().collect(); }

    /// Enable or disable automatic reordering through
    /// [`maybe_reorder`][Self::maybe_reorder].
    pub fn set_auto_reorder(&self, on: bool) {
        self.store.borrow_mut().auto_reorder = on;
    }

    /// Return `true` if automatic reordering is enabled.
    pub fn auto_reorder(&self) -> bool { self.store.borrow().auto_reorder }

    /// Run a sifting pass if automatic reordering is enabled and the number of
    /// live nodes has outgrown the current threshold. The threshold is reset
    /// to twice the post-pass size.
    ///
    /// Returns `true` if a pass was run.
    pub fn maybe_reorder(&self) -> bool {
        let mut store = self.store.borrow_mut();
        if !store.auto_reorder || store.allocated() < store.reorder_threshold {
            return false;
        }
        store.collect();
        if store.allocated() < store.reorder_threshold { return false; }
        store.sift();
        true
    }

    /// Unconditionally run a sifting pass.
    pub fn reorder(&self) { self.store.borrow_mut().sift(); }

    /// Number of reordering passes run so far. Node levels computed under an
    /// older generation are stale.
    pub fn generation(&self) -> u64 { self.store.borrow().generation }

    /// Current variable order, from the top level down.
    pub fn order(&self) -> Vec<usize> {
        self.store.borrow().level2var.iter().map(|v| *v as usize).collect()
    }

    /// Borrow the store read-only for a traversal.
    ///
    /// No handle may be created or dropped while the view is alive.
    pub fn view(&self) -> View<'_> { View { store: self.store.borrow() } }

    /// Return an object containing an encoding of the diagrams under `roots`
    /// in the [dot language][dot-lang]. Solid edges are taken when the node's
    /// variable is 1, dashed edges when it is 0.
    ///
    /// [dot-lang]: https://en.wikipedia.org/wiki/DOT_(graph_description_language)
    pub fn to_graphviz(&self, name: &str, roots: &[(&str, &Func)])
        -> tabbycat::Graph
    {
        use tabbycat::*;
        use tabbycat::attributes::*;

        const FONT: &str = "DejaVu Sans";
        const FONTSIZE: f64 = 10.0; // pt
        const NODE_MARGIN: f64 = 0.025; // in
        const NODE_HEIGHT: f64 = 0.200; // in
        const NODE_COLOR: Color = Color::Rgb(115, 150, 250);
        const TERM_COLOR: Color = Color::Rgb(200, 200, 200);

        let store = self.store.borrow();
        let mut statements
            = StmtList::new()
            .add_attr(
                AttrType::Graph,
                AttrList::new().add_pair(rankdir(RankDir::TB)),
            )
            .add_attr(
                AttrType::Node,
                AttrList::new()
                    .add_pair(fontname(FONT))
                    .add_pair(fontsize(FONTSIZE))
                    .add_pair(margin(NODE_MARGIN))
                    ,
            );
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack: Vec<NodeId> = Vec::new();
        for (root_label, func) in roots.iter() {
            statements = statements.add_node(
                Identity::quoted(*root_label),
                None,
                Some(AttrList::new().add_pair(shape(Shape::Box))),
            );
            statements = statements.add_edge(
                Edge::head_node(Identity::quoted(*root_label), None)
                    .arrow_to_node((func.id as usize).into(), None)
            );
            stack.push(func.id);
        }
        while let Some(id) = stack.pop() {
            if !seen.insert(id) { continue; }
            let node = store.nodes[id as usize];
            if id <= TRUE {
                let attrs
                    = AttrList::new()
                    .add_pair(label(id.to_string()))
                    .add_pair(shape(Shape::Box))
                    .add_pair(style(Style::Filled))
                    .add_pair(fillcolor(TERM_COLOR));
                statements
                    = statements.add_node((id as usize).into(), None, Some(attrs));
                continue;
            }
            let attrs
                = AttrList::new()
                .add_pair(label(format!("q{}", node.var)))
                .add_pair(shape(Shape::Circle))
                .add_pair(height(NODE_HEIGHT))
                .add_pair(style(Style::Filled))
                .add_pair(fillcolor(NODE_COLOR));
            statements
                = statements.add_node((id as usize).into(), None, Some(attrs));
            statements
                = statements.add_edge(
                    Edge::head_node((id as usize).into(), None)
                        .arrow_to_node((node.hi as usize).into(), None)
                );
            statements
                = statements.add_edge(
                    Edge::head_node((id as usize).into(), None)
                        .arrow_to_node((node.lo as usize).into(), None)
                        .add_attrpair(style(Style::Dashed))
                );
            stack.push(node.lo);
            stack.push(node.hi);
        }
        GraphBuilder::default()
            .graph_type(GraphType::DiGraph)
            .strict(false)
            .id(Identity::quoted(name))
            .stmts(statements)
            .build()
            .expect("error building graphviz")
    }
}

/// Read-only access to node structure, held for the duration of a traversal.
pub struct View<'a> {
    store: Ref<'a, Store>,
}

impl<'a> View<'a> {
    /// Number of variables; also the level of the two terminals.
    pub fn num_vars(&self) -> usize { self.store.nvars }

    /// Level of the node `id` in the current order.
    pub fn level(&self, id: NodeId) -> usize { self.store.level(id) }

    /// Variable placed at `level`.
    pub fn var_at(&self, level: usize) -> usize {
        self.store.level2var[level] as usize
    }

    /// Cofactors of `id` with respect to the variable at `level`, which must
    /// not lie below the node.
    pub fn cofactors(&self, id: NodeId, level: usize) -> (NodeId, NodeId) {
        self.store.cofactors(id, level)
    }

    /// Structure of node `id`.
    pub fn node(&self, id: NodeId) -> NodeView {
        match self.store.nodes[id as usize] {
            Node { var: TERMINAL, .. } => NodeView::Const(id == TRUE),
            Node { var, lo, hi } => NodeView::Branch { var: var as usize, lo, hi },
        }
    }

    /// Reordering generation the view was taken under.
    pub fn generation(&self) -> u64 { self.store.generation }

    /// Number of garbage collections run before the view was taken. Node ids
    /// freed by a collection may be reused for other functions.
    pub fn collections(&self) -> u64 { self.store.collections }
}

/* Func **********************************************************************/

/// Counted handle to a Boolean function owned by a [`Manager`].
///
/// Cloning retains the underlying node; dropping releases it. Two handles
/// compare equal iff they denote the same function in the same manager.
pub struct Func {
    store: Rc<RefCell<Store>>,
    id: NodeId,
}

impl Func {
    fn new(store: Rc<RefCell<Store>>, id: NodeId) -> Self {
        store.borrow_mut().refs[id as usize] += 1;
        Self { store, id }
    }

    fn unary<F>(&self, op: F) -> Self
    where F: FnOnce(&mut Store) -> NodeId
    {
        let id = {
            let mut store = self.store.borrow_mut();
            store.maybe_collect();
            op(&mut store)
        };
        Self::new(Rc::clone(&self.store), id)
    }

    fn binary(&self, rhs: &Self, op: OpKey) -> Self {
        debug_assert!(Rc::ptr_eq(&self.store, &rhs.store), "mixed managers");
        self.unary(|store| store.apply(op, self.id, rhs.id))
    }

    /// Node id of the root. Stable across reordering.
    pub fn id(&self) -> NodeId { self.id }

    /// Conjunction.
    pub fn and(&self, rhs: &Self) -> Self { self.binary(rhs, OpKey::And) }

    /// Disjunction.
    pub fn or(&self, rhs: &Self) -> Self { self.binary(rhs, OpKey::Or) }

    /// Exclusive or.
    pub fn xor(&self, rhs: &Self) -> Self { self.binary(rhs, OpKey::Xor) }

    /// Equivalence.
    pub fn xnor(&self, rhs: &Self) -> Self {
        self.unary(|store| {
            let x = store.apply(OpKey::Xor, self.id, rhs.id);
            store.apply(OpKey::Xor, x, TRUE)
        })
    }

    /// Negation.
    pub fn not(&self) -> Self {
        self.unary(|store| store.apply(OpKey::Xor, self.id, TRUE))
    }

    /// `self ? then : other`.
    pub fn ite(&self, then: &Self, other: &Self) -> Self {
        self.unary(|store| {
            let a = store.apply(OpKey::And, self.id, then.id);
            let nc = store.apply(OpKey::Xor, self.id, TRUE);
            let b = store.apply(OpKey::And, nc, other.id);
            store.apply(OpKey::Or, a, b)
        })
    }

    /// Cofactor with variable `var` fixed to `value`.
    pub fn restrict(&self, var: usize, value: bool) -> Self {
        self.unary(|store| store.restrict(self.id, var as u32, value))
    }

    /// Return `true` if `self` is constant false.
    pub fn is_false(&self) -> bool { self.id == FALSE }

    /// Return `true` if `self` is constant true.
    pub fn is_true(&self) -> bool { self.id == TRUE }

    /// Return `true` if some assignment satisfies `self`.
    pub fn is_satisfiable(&self) -> bool { self.id != FALSE }

    /// Evaluate at a full assignment, indexed by variable.
    ///
    /// *Panics if `assignment` is shorter than the number of variables on
    /// which `self` depends.*
    pub fn eval(&self, assignment: &[bool]) -> bool {
        let store = self.store.borrow();
        let mut id = self.id;
        while id > TRUE {
            let Node { var, lo, hi } = store.nodes[id as usize];
            id = if assignment[var as usize] { hi } else { lo };
        }
        id == TRUE
    }

    /// Number of distinct paths from the root to the true terminal.
    pub fn path_count(&self) -> f64 {
        fn count(
            store: &Store,
            id: NodeId,
            memo: &mut FxHashMap<NodeId, f64>,
        ) -> f64
        {
            match id {
                FALSE => 0.0,
                TRUE => 1.0,
                _ => {
                    if let Some(c) = memo.get(&id) { return *c; }
                    let Node { lo, hi, .. } = store.nodes[id as usize];
                    let c = count(store, lo, memo) + count(store, hi, memo);
                    memo.insert(id, c);
                    c
                },
            }
        }
        let store = self.store.borrow();
        count(&store, self.id, &mut FxHashMap::default())
    }

    /// Number of nodes reachable from the root, terminals included.
    pub fn size(&self) -> usize {
        let store = self.store.borrow();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) || id <= TRUE { continue; }
            let Node { lo, hi, .. } = store.nodes[id as usize];
            stack.push(lo);
            stack.push(hi);
        }
        seen.len()
    }

    /// Variables `self` depends on, in ascending order.
    pub fn support(&self) -> Vec<usize> {
        let store = self.store.borrow();
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        let mut vars: FxHashSet<usize> = FxHashSet::default();
        let mut stack = vec![self.id];
        while let Some(id) = stack.pop() {
            if id <= TRUE || !seen.insert(id) { continue; }
            let Node { var, lo, hi } = store.nodes[id as usize];
            vars.insert(var as usize);
            stack.push(lo);
            stack.push(hi);
        }
        let mut vars: Vec<usize> = vars.into_iter().collect();
        vars.sort_unstable();
        vars
    }
}

impl Clone for Func {
    fn clone(&self) -> Self { Self::new(Rc::clone(&self.store), self.id) }
}

impl Drop for Func {
    fn drop(&mut self) {
        self.store.borrow_mut().refs[self.id as usize] -= 1;
    }
}

impl PartialEq for Func {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.store, &other.store)
    }
}

impl Eq for Func { }

impl Hash for Func {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            FALSE => write!(f, "Func(false)"),
            TRUE => write!(f, "Func(true)"),
            id => write!(f, "Func(#{})", id),
        }
    }
}

impl Not for &Func {
    type Output = Func;

    fn not(self) -> Self::Output { Func::not(self) }
}

impl Not for Func {
    type Output = Func;

    fn not(self) -> Self::Output { Func::not(&self) }
}

macro_rules! impl_func_op {
    ( $trait:ident, $trait_fn:ident, $method:ident ) => {
        impl $trait<&Func> for &Func {
            type Output = Func;

            fn $trait_fn(self, rhs: &Func) -> Self::Output { self.$method(rhs) }
        }

        impl $trait<Func> for Func {
            type Output = Func;

            fn $trait_fn(self, rhs: Func) -> Self::Output { self.$method(&rhs) }
        }

        impl $trait<&Func> for Func {
            type Output = Func;

            fn $trait_fn(self, rhs: &Func) -> Self::Output { self.$method(rhs) }
        }

        impl $trait<Func> for &Func {
            type Output = Func;

            fn $trait_fn(self, rhs: Func) -> Self::Output { self.$method(&rhs) }
        }
    }
}
impl_func_op!(BitAnd, bitand, and);
impl_func_op!(BitOr, bitor, or);
impl_func_op!(BitXor, bitxor, xor);

//! PPM* context model over a sliding-window suffix tree.
//!
//! The tree indexes every suffix of the last `window` bytes (Larsson's
//! sliding-window suffix tree). Each internal node is a context, and the
//! counts on its child edges say how often each symbol followed it.
//!
//! Contexts are unbounded. Coding a symbol walks from the longest context
//! towards shorter ones:
//!
//! 1. If the active point is inside an edge, the context is deterministic
//!    (only one symbol has ever followed it). The predicted symbol is coded
//!    as a binary hit/miss with a predictor chosen by context length and
//!    MPS count.
//! 2. Otherwise up to [`MAX_WALK`] shorter contexts are scanned and the walk
//!    starts at the one whose most probable symbol is most likely (local
//!    order estimation). From there, each context codes either one of its
//!    not-yet-excluded symbols or an escape, whose probability comes from
//!    an adaptive predictor indexed by a method-C estimate.
//! 3. When all contexts escape, or the exclusion budget runs out, the
//!    order-0 model codes the symbol with every excluded symbol removed.
//!
//! Encoding and decoding share one walk: the coder's
//! [`target`](IntervalCoder::target) tells which side is running.

use log::trace;

use super::arena::{NodeArena, NodeId, NIL};
use super::exclusion::ExclusionSet;
use super::order0::Order0Model;
use super::predictor::BitPredictor;
use crate::arith::{ArithmeticModel, IntervalCoder, IntervalDecoder, IntervalEncoder};
use crate::error::{BicomError, Result};

/// Most symbols excluded before falling back to order 0.
pub const MAX_EXCLS: usize = 192;
/// Most non-deterministic contexts scanned per symbol.
pub const MAX_WALK: usize = 70;
/// Most non-deterministic contexts escaped through per symbol.
pub const MAX_NONDET: usize = 40;
/// Divisor of the predictor adaptation step.
pub const ESC_ADJUST: u32 = 128;
/// Context-length classes of the escape predictors.
pub const ESC_ORDERS: usize = 7;
/// MPS-count classes of the deterministic predictors.
pub const DET_LEAVES: usize = 6;

/// Context-length classes of the deterministic predictors.
const DET_LENGTHS: usize = 20;
/// Method-C estimate classes of the escape predictors.
const ESC_CLASSES: usize = 63;

/// Smallest supported window.
pub const MIN_WINDOW: u32 = 16;
/// Largest supported window; keeps every probability total below
/// [`MAXP1`](crate::arith::MAXP1).
pub const MAX_WINDOW: u32 = 1 << 20;

/// Initial hit weight (out of 64) of the deterministic predictors, by MPS
/// count class (rows) and context length class (columns).
const DET_INIT: [[u32; DET_LENGTHS]; DET_LEAVES] = [
    [25, 29, 30, 33, 37, 42, 44, 42, 45, 47, 45, 48, 49, 50, 53, 59, 60, 61, 61, 61],
    [23, 31, 26, 31, 38, 45, 46, 42, 46, 50, 47, 49, 52, 49, 53, 59, 60, 61, 61, 61],
    [23, 31, 31, 39, 44, 48, 52, 50, 54, 52, 54, 55, 57, 55, 57, 62, 61, 62, 61, 61],
    [23, 28, 33, 46, 51, 54, 54, 52, 54, 56, 57, 56, 56, 58, 58, 62, 61, 63, 63, 59],
    [16, 27, 32, 47, 52, 53, 53, 56, 56, 58, 58, 53, 57, 60, 61, 62, 63, 63, 63, 57],
    [25, 33, 38, 56, 52, 53, 56, 55, 58, 54, 57, 56, 55, 61, 62, 63, 63, 62, 63, 61],
];

/// A position in the tree: `proj` symbols below node `ins`, on the edge to
/// `r` when `proj > 0`.
#[derive(Debug, Clone, Copy)]
struct Point {
    ins: NodeId,
    r: NodeId,
    proj: u32,
    /// First symbol of the edge to `r`.
    sym: u8,
}

impl Point {
    #[inline]
    fn in_edge(&self) -> bool {
        self.r != NIL
    }
}

/// Adaptive PPM* model driving the arithmetic coder.
pub struct SuffixTreeModel {
    window: u32,
    size: u32,
    nodes: NodeArena,
    text: Vec<u8>,
    root: NodeId,
    /// Longest suffix of the text that is not yet a leaf.
    active: Point,
    front: u32,
    tail: u32,
    /// Child whose count was bumped when the active point entered it; the
    /// bump is taken back if that edge gets split.
    extra_count: NodeId,
    excl: ExclusionSet,
    order0: Order0Model,
    det: [[BitPredictor; DET_LEAVES]; DET_LENGTHS],
    escape: [[BitPredictor; ESC_ORDERS]; ESC_CLASSES],
    escape2: [[BitPredictor; ESC_ORDERS]; ESC_CLASSES],
}

impl SuffixTreeModel {
    /// Create a model over a window of `window` bytes, clamped to
    /// [`MIN_WINDOW`]..=[`MAX_WINDOW`].
    pub fn new(window: usize) -> Self {
        let clamped = (window.min(MAX_WINDOW as usize) as u32).max(MIN_WINDOW);
        if clamped as usize != window {
            log::warn!("window size {} clamped to {}", window, clamped);
        }
        let mut model = Self {
            window: clamped,
            size: 0,
            nodes: NodeArena::new(clamped),
            text: vec![0; clamped as usize],
            root: NIL,
            active: Point {
                ins: NIL,
                r: NIL,
                proj: 0,
                sym: 0,
            },
            front: 0,
            tail: 0,
            extra_count: NIL,
            excl: ExclusionSet::new(),
            order0: Order0Model::new(),
            det: [[BitPredictor::new(0, 0); DET_LEAVES]; DET_LENGTHS],
            escape: [[BitPredictor::new(0, 0); ESC_ORDERS]; ESC_CLASSES],
            escape2: [[BitPredictor::new(0, 0); ESC_ORDERS]; ESC_CLASSES],
        };
        model.reset();
        model
    }

    /// Window size in bytes.
    pub fn window(&self) -> usize {
        self.window as usize
    }

    /// Number of bytes currently in the window.
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Whether nothing has been seen since the last reset.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget everything: empty tree, initial predictors, fresh order-0
    /// model.
    pub fn reset(&mut self) {
        trace!("suffix tree reset, window {}", self.window);
        self.nodes.reset();
        self.root = self.nodes.alloc_branch(0, 0);
        self.nodes.edge_mut(self.root).child_count = 1;
        self.size = 0;
        self.active = Point {
            ins: self.root,
            r: NIL,
            proj: 0,
            sym: 0,
        };
        self.front = 0;
        self.tail = 0;
        self.extra_count = NIL;
        self.excl.clear();
        self.order0.reset();

        for (i, row) in self.det.iter_mut().enumerate() {
            for (j, pred) in row.iter_mut().enumerate() {
                let hit = DET_INIT[j][i];
                *pred = BitPredictor::new(hit, 64 - hit);
            }
        }
        for (i, (row, row2)) in self.escape.iter_mut().zip(self.escape2.iter_mut()).enumerate() {
            let init = BitPredictor::new(63 - i as u32, i as u32 + 1);
            row.fill(init);
            row2.fill(init);
        }
    }

    /// Append `symbol` to the window, evicting the oldest byte when full.
    pub fn update(&mut self, symbol: u8) -> Result<()> {
        if self.size == self.window {
            self.advance_tail()?;
        } else {
            self.size += 1;
            if self.size == self.window {
                trace!("window full at {} bytes, evicting from now on", self.window);
            }
        }
        self.text[self.front as usize] = symbol;
        self.advance_front()
    }

    // ---- window arithmetic ----

    #[inline]
    fn wrap_add(&self, a: u32, b: u32) -> u32 {
        let s = a + b;
        if s >= self.window {
            s - self.window
        } else {
            s
        }
    }

    #[inline]
    fn wrap_sub(&self, a: u32, b: u32) -> u32 {
        if a >= b {
            a - b
        } else {
            a + self.window - b
        }
    }

    #[inline]
    fn depth(&self, id: NodeId) -> u32 {
        self.nodes.branch(id).depth
    }

    #[inline]
    fn suffix(&self, id: NodeId) -> NodeId {
        self.nodes.branch(id).suffix
    }

    #[inline]
    fn first_child(&self, id: NodeId) -> NodeId {
        self.nodes.branch(id).first_child
    }

    #[inline]
    fn next(&self, id: NodeId) -> NodeId {
        self.nodes.edge(id).next
    }

    #[inline]
    fn count(&self, id: NodeId) -> u32 {
        self.nodes.edge(id).count
    }

    /// Window position where the label of edge `r` (below `ins`) starts.
    #[inline]
    fn edge_start(&self, ins: NodeId, r: NodeId) -> u32 {
        if self.nodes.is_leaf(r) {
            self.wrap_add(r, self.depth(ins))
        } else {
            self.nodes.branch(r).pos
        }
    }

    // ---- tree primitives ----

    /// Child of `parent` whose edge starts with `c`. A hit beyond the
    /// second child is moved up to second place.
    fn get_child(&mut self, parent: NodeId, c: u8) -> NodeId {
        let first = self.first_child(parent);
        if first == NIL || self.nodes.edge(first).sym == c {
            return first;
        }
        let second = self.next(first);
        if second == NIL || self.nodes.edge(second).sym == c {
            return second;
        }
        let mut prev = second;
        let mut cur = self.next(second);
        while cur != NIL {
            if self.nodes.edge(cur).sym == c {
                let after = self.next(cur);
                self.nodes.edge_mut(prev).next = after;
                self.nodes.edge_mut(cur).next = second;
                self.nodes.edge_mut(first).next = cur;
                return cur;
            }
            prev = cur;
            cur = self.next(cur);
        }
        NIL
    }

    /// Move `p` down the tree until `proj` ends inside the edge to `r` (or
    /// at a node, with `r == NIL`).
    fn canonize(&mut self, p: &mut Point) -> Result<()> {
        if p.proj > 0 && p.ins == NIL {
            p.ins = self.root;
            p.proj -= 1;
            p.r = NIL;
        }
        while p.proj > 0 {
            if p.r == NIL {
                p.sym = self.text[self.wrap_sub(self.front, p.proj) as usize];
                p.r = self.get_child(p.ins, p.sym);
                if p.r == NIL {
                    return Err(BicomError::TreeCorrupted("path leaves the tree"));
                }
            }
            if self.nodes.is_leaf(p.r) {
                break;
            }
            let diff = self.depth(p.r) - self.depth(p.ins);
            if p.proj < diff {
                break;
            }
            p.proj -= diff;
            p.ins = p.r;
            p.r = NIL;
        }
        Ok(())
    }

    /// Link `child` under `parent` with `counts`. It goes first unless the
    /// current first child has a higher count, in which case it goes second.
    fn create_edge(&mut self, parent: NodeId, child: NodeId, c: u8, counts: u32) {
        let first = self.first_child(parent);
        let edge = self.nodes.edge_mut(child);
        edge.parent = parent;
        edge.count = counts;
        edge.sym = c;
        let pe = self.nodes.edge_mut(parent);
        pe.child_count = pe.child_count.wrapping_add(1);
        self.nodes.branch_mut(parent).context_total += counts;
        if first != NIL && self.count(first) > counts {
            let after = self.next(first);
            self.nodes.edge_mut(child).next = after;
            self.nodes.edge_mut(first).next = child;
        } else {
            self.nodes.edge_mut(child).next = first;
            self.nodes.branch_mut(parent).first_child = child;
        }
    }

    /// Unlink `child` from `parent`, returning its count. Removing the
    /// first child promotes the highest remaining count to first place.
    fn delete_edge(&mut self, parent: NodeId, child: NodeId) -> Result<u32> {
        let occurs = self.count(child);
        let first = self.first_child(parent);
        if first == child {
            let rest = self.next(child);
            self.unlink_bookkeeping(parent, occurs);
            self.nodes.branch_mut(parent).first_child = rest;
            if rest == NIL {
                return Ok(occurs);
            }
            let mut best = rest;
            let mut best_prev = NIL;
            let mut best_count = self.count(rest);
            let mut prev = rest;
            let mut cur = self.next(rest);
            while cur != NIL {
                if self.count(cur) > best_count {
                    best_count = self.count(cur);
                    best = cur;
                    best_prev = prev;
                }
                prev = cur;
                cur = self.next(cur);
            }
            if best_prev != NIL {
                let after = self.next(best);
                self.nodes.edge_mut(best_prev).next = after;
                self.nodes.edge_mut(best).next = rest;
                self.nodes.branch_mut(parent).first_child = best;
            }
            return Ok(occurs);
        }

        let mut prev = first;
        while prev != NIL {
            let cur = self.next(prev);
            if cur == child {
                let after = self.next(child);
                self.nodes.edge_mut(prev).next = after;
                self.unlink_bookkeeping(parent, occurs);
                return Ok(occurs);
            }
            prev = cur;
        }
        Err(BicomError::TreeCorrupted("edge missing from parent's child list"))
    }

    #[inline]
    fn unlink_bookkeeping(&mut self, parent: NodeId, occurs: u32) {
        let pe = self.nodes.edge_mut(parent);
        pe.child_count = pe.child_count.wrapping_sub(1);
        let branch = self.nodes.branch_mut(parent);
        branch.context_total = branch.context_total.wrapping_sub(occurs);
    }

    /// Count one more occurrence of `child` in `parent`'s context. If it
    /// overtakes the first child, everything in front of it is moved behind
    /// it (in reverse order).
    fn inc_mpc(&mut self, parent: NodeId, child: NodeId) {
        self.nodes.edge_mut(child).count += 1;
        self.nodes.branch_mut(parent).context_total += 1;
        let first = self.first_child(parent);
        if first == child || self.count(child) <= self.count(first) {
            return;
        }
        loop {
            let n = self.first_child(parent);
            if n == child {
                break;
            }
            let after_n = self.next(n);
            let after_child = self.next(child);
            self.nodes.branch_mut(parent).first_child = after_n;
            self.nodes.edge_mut(n).next = after_child;
            self.nodes.edge_mut(child).next = n;
        }
    }

    /// Propagate a fresh edge position `i` up from `v`, updating `pos`
    /// values, until a node with a spare credit absorbs it.
    fn update_credits(&mut self, mut v: NodeId, mut i: u32) {
        let mut ii = self.wrap_sub(i, self.tail);
        while v != self.root {
            let u = self.nodes.edge(v).parent;
            let d = self.depth(u);
            let j = self.wrap_sub(self.nodes.branch(v).pos, d);
            let jj = self.wrap_sub(j, self.tail);
            if ii > jj {
                let pos = self.wrap_add(i, d);
                self.nodes.branch_mut(v).pos = pos;
            } else {
                i = j;
                ii = jj;
            }
            let branch = self.nodes.branch_mut(v);
            if !branch.cred {
                branch.cred = true;
                break;
            }
            branch.cred = false;
            v = u;
        }
    }

    /// Make a detached leaf ready to be linked.
    fn fresh_leaf(&mut self, leaf: NodeId) {
        *self.nodes.edge_mut(leaf) = Default::default();
    }

    // ---- window maintenance ----

    /// Add the byte at `front` to the tree.
    fn advance_front(&mut self) -> Result<()> {
        let c = self.text[self.front as usize];
        let mut ap = self.active;
        let mut last_new = NIL;
        loop {
            self.canonize(&mut ap)?;
            let u;
            if !ap.in_edge() {
                self.extra_count = NIL;
                if ap.ins == NIL {
                    ap.r = self.root;
                    break;
                }
                ap.r = self.get_child(ap.ins, c);
                if ap.r != NIL {
                    ap.sym = c;
                    self.inc_mpc(ap.ins, ap.r);
                    self.extra_count = ap.r;
                    break;
                }
                u = ap.ins;
            } else {
                let j = self.edge_start(ap.ins, ap.r);
                let b = self.text[self.wrap_add(j, ap.proj) as usize];
                if c == b {
                    break;
                }
                // split the edge
                u = self
                    .nodes
                    .alloc_branch(self.depth(ap.ins) + ap.proj, self.wrap_sub(self.front, ap.proj));
                let mut counts = self.delete_edge(ap.ins, ap.r)?;
                self.create_edge(ap.ins, u, ap.sym, counts);
                if self.extra_count == ap.r {
                    counts = counts.wrapping_sub(1);
                }
                self.create_edge(u, ap.r, b, counts);
                if !self.nodes.is_leaf(ap.r) {
                    let pos = self.wrap_add(j, ap.proj);
                    self.nodes.branch_mut(ap.r).pos = pos;
                }
            }
            self.extra_count = NIL;
            let leaf = self.wrap_sub(self.front, self.depth(u));
            self.fresh_leaf(leaf);
            self.create_edge(u, leaf, c, 1);
            self.nodes.edge_mut(self.root).child_count = 1;
            if u == ap.ins {
                self.update_credits(u, leaf);
            }
            if last_new != NIL {
                self.nodes.branch_mut(last_new).suffix = u;
            }
            last_new = u;
            ap.ins = self.suffix(ap.ins);
            ap.r = NIL;
        }
        if last_new != NIL {
            self.nodes.branch_mut(last_new).suffix = ap.ins;
        }
        ap.proj += 1;
        self.active = ap;
        self.front = self.wrap_add(self.front, 1);
        Ok(())
    }

    /// Remove the suffix starting at `tail` from the tree.
    fn advance_tail(&mut self) -> Result<()> {
        let mut ap = self.active;
        self.canonize(&mut ap)?;
        let v = self.tail;
        let u = self.nodes.edge(v).parent;
        let mut counts = self.delete_edge(u, v)?;
        if v == ap.r {
            // the active suffix takes over the deleted leaf's edge
            let i = self.wrap_sub(self.front, self.depth(ap.ins) + ap.proj);
            if self.extra_count == v {
                self.extra_count = i;
                counts += 1;
            }
            let sym = self.nodes.edge(v).sym;
            self.fresh_leaf(i);
            self.create_edge(ap.ins, i, sym, counts);
            self.update_credits(ap.ins, i);
            ap.ins = self.suffix(ap.ins);
            ap.r = NIL;
        } else if u != self.root && self.nodes.edge(u).child_count == 0 {
            // u is left with a single child: merge it into its parent edge
            let c = self.nodes.edge(u).sym;
            let w = self.nodes.edge(u).parent;
            let d = self.depth(u) - self.depth(w);
            let s = self.first_child(u);
            if u == ap.ins {
                ap.ins = w;
                ap.proj += d;
                ap.sym = c;
                self.extra_count = NIL;
            } else if u == ap.r {
                if self.extra_count == u {
                    self.extra_count = s;
                }
                ap.r = s;
            }
            if self.nodes.branch(u).cred {
                let i = self.wrap_sub(self.nodes.branch(u).pos, self.depth(w));
                self.update_credits(w, i);
            }
            self.delete_edge(u, s)?;
            let counts = self.delete_edge(w, u)?;
            self.create_edge(w, s, c, counts);
            if !self.nodes.is_leaf(s) {
                let pos = self.wrap_sub(self.nodes.branch(s).pos, d);
                self.nodes.branch_mut(s).pos = pos;
            }
            self.nodes.release(u);
        }
        self.active = ap;
        self.tail = self.wrap_add(self.tail, 1);
        Ok(())
    }

    // ---- coding ----

    /// Code one symbol. When `coder` is decoding, `c` is ignored and the
    /// decoded symbol is returned.
    fn walk<C: IntervalCoder>(&mut self, mut c: u8, coder: &mut C) -> Result<u8> {
        self.excl.clear();
        let mut ap = self.active;
        self.canonize(&mut ap)?;
        self.active = ap;
        let mut context = ap;

        'order0: {
            if context.in_edge() {
                let mut ins = context.ins;
                if self.first_child(ins) != NIL {
                    let prediction = self.text
                        [self.wrap_add(self.edge_start(ins, context.r), context.proj) as usize];
                    let (len_class, mps_class) = self.det_classes(ins, context.proj);
                    let pred = self.det[len_class][mps_class];
                    let p1 = pred.total();
                    let escaped = match coder.target(p1) {
                        Some(t) => t >= pred.hit,
                        None => c != prediction,
                    };
                    self.det[len_class][mps_class].adjust(!escaped, ESC_ADJUST);
                    if !escaped {
                        coder.narrow(p1, 0, pred.hit)?;
                        return Ok(prediction);
                    }
                    coder.narrow(p1, pred.hit, p1)?;
                    self.excl.exclude(prediction);
                }
                // shorten the context until it is non-deterministic
                loop {
                    if self.depth(ins) < 1 {
                        break 'order0;
                    }
                    context.ins = self.suffix(ins);
                    context.r = NIL;
                    self.canonize(&mut context)?;
                    if !context.in_edge() {
                        break;
                    }
                    ins = context.ins;
                }
            }

            // pick the starting context by best MPS probability
            let mut contexts = [NIL; MAX_NONDET];
            let mut n = 0;
            let mut best = (0u64, 1u64);
            for _ in 0..MAX_WALK {
                if context.ins == NIL || context.ins == self.root {
                    break;
                }
                let ins = context.ins;
                let first = self.first_child(ins);
                if first != NIL {
                    let ratio = (
                        self.count(first) as u64,
                        self.nodes.branch(ins).context_total as u64,
                    );
                    if n == 0 {
                        best = ratio;
                    } else if ratio.0 * best.1 > best.0 * ratio.1 {
                        n = 0;
                        best = ratio;
                    }
                    if n >= MAX_NONDET {
                        break;
                    }
                    contexts[n] = ins;
                    n += 1;
                }
                context.ins = self.suffix(ins);
                self.canonize(&mut context)?;
            }

            let mut excls_left = MAX_EXCLS.saturating_sub(self.excl.len());
            let mut new_edges = [NIL; MAX_EXCLS];
            for (cnum, &ins) in contexts[..n].iter().enumerate() {
                if excls_left == 0 {
                    break;
                }
                let mut escaped = true;
                let mut hits = 0u32;
                let mut num_new = 0;
                let mut edge = self.first_child(ins);
                while edge != NIL && excls_left > 0 {
                    let sym = self.nodes.edge(edge).sym;
                    if self.excl.exclude(sym) {
                        excls_left -= 1;
                        new_edges[num_new] = edge;
                        num_new += 1;
                        hits += self.count(edge);
                        if sym == c {
                            escaped = false;
                        }
                    }
                    edge = self.next(edge);
                }
                if num_new == 0 {
                    continue;
                }
                if edge != NIL {
                    // budget ran out mid-context
                    self.excl.backup(num_new);
                    break;
                }

                let children = self.nodes.edge(ins).child_count as u32 + 1;
                let order = match self.depth(ins) as usize {
                    d if d >= ESC_ORDERS => ESC_ORDERS - 1,
                    0 => 0,
                    d => d - 1,
                };
                let class = ((children << 6) / (children + hits)).saturating_sub(1).min(62) as usize;
                let pred = if cnum == 0 {
                    &mut self.escape[class][order]
                } else {
                    &mut self.escape2[class][order]
                };
                let (hit, total) = (pred.hit, pred.total());
                if let Some(t) = coder.target(total) {
                    escaped = t >= hit;
                }
                pred.adjust(!escaped, ESC_ADJUST);
                if escaped {
                    coder.narrow(total, hit, total)?;
                    continue;
                }
                coder.narrow(total, 0, hit)?;

                // code the symbol among the new ones, MPS boosted by a quarter
                let edges = &new_edges[..num_new];
                let boost = self.count(edges[0]) >> 2;
                let p1 = hits + boost;
                let weight = |k: usize, e: NodeId| self.count(e) + if k == 0 { boost } else { 0 };
                let mut low = 0;
                let mut found = None;
                match coder.target(p1) {
                    Some(mut t) => {
                        for (k, &e) in edges.iter().enumerate() {
                            let w = weight(k, e);
                            if t < w {
                                found = Some((self.nodes.edge(e).sym, w));
                                break;
                            }
                            low += w;
                            t -= w;
                        }
                    }
                    None => {
                        for (k, &e) in edges.iter().enumerate() {
                            let w = weight(k, e);
                            if self.nodes.edge(e).sym == c {
                                found = Some((c, w));
                                break;
                            }
                            low += w;
                        }
                    }
                }
                let (sym, w) = found.ok_or(BicomError::ModelMismatch)?;
                coder.narrow(p1, low, low + w)?;
                return Ok(sym);
            }
        }

        c = self.order0.code_excluding(c, coder, &self.excl)?;
        self.order0.update(c);
        Ok(c)
    }

    /// Deterministic predictor indices: context length class and MPS count
    /// class.
    fn det_classes(&self, ins: NodeId, proj: u32) -> (usize, usize) {
        let clen = (self.depth(ins) + proj).max(1);
        let mut len_class = clen - 1;
        if len_class >= 8 {
            len_class = ((len_class - 8) >> 1) + 8;
            let mut step = 12;
            while len_class >= step {
                len_class = ((len_class - step) >> 1) + step;
                step += 2;
            }
        }
        let len_class = len_class.min(DET_LENGTHS as u32 - 1);

        let mut mps = self.count(self.first_child(ins));
        if ins == self.extra_count {
            mps = mps.wrapping_sub(1);
        }
        if mps != 0 {
            mps -= 1;
        }
        if mps >= 2 {
            let mut rest = mps - 2;
            mps = 2;
            while rest != 0 {
                rest >>= 2;
                mps += 1;
            }
            mps = mps.min(DET_LEAVES as u32 - 1);
        }
        (len_class as usize, mps as usize)
    }

    // ---- diagnostics ----

    /// Verify the structural invariants of the whole tree.
    ///
    /// Checks child bookkeeping, parent links, context totals, depths
    /// against the window text, distinct first symbols among siblings and
    /// suffix links. Intended for tests; cost is proportional to the sum
    /// of all node depths.
    pub fn check_invariants(&self) -> Result<()> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            let depth = self.depth(node);
            let mut seen = [false; 256];
            let mut children = 0u32;
            let mut total = 0u32;
            let mut child = self.first_child(node);
            while child != NIL {
                let edge = self.nodes.edge(child);
                if edge.parent != node {
                    return Err(BicomError::TreeCorrupted("parent link mismatch"));
                }
                if std::mem::replace(&mut seen[edge.sym as usize], true) {
                    return Err(BicomError::TreeCorrupted("duplicate child symbol"));
                }
                let leaf = self.some_leaf(child)?;
                if self.leaf_len(leaf) <= depth
                    || self.text[self.wrap_add(leaf, depth) as usize] != edge.sym
                {
                    return Err(BicomError::TreeCorrupted("edge symbol does not match text"));
                }
                if !self.nodes.is_leaf(child) {
                    if self.depth(child) <= depth {
                        return Err(BicomError::TreeCorrupted("child not deeper than parent"));
                    }
                    stack.push(child);
                }
                children += 1;
                total = total.wrapping_add(edge.count);
                child = edge.next;
            }
            if self.nodes.branch(node).context_total != total {
                return Err(BicomError::TreeCorrupted("context total mismatch"));
            }
            if node == self.root {
                continue;
            }
            if children < 2 {
                return Err(BicomError::TreeCorrupted("internal node with fewer than two children"));
            }
            if self.nodes.edge(node).child_count != (children - 1) as u8 {
                return Err(BicomError::TreeCorrupted("child count mismatch"));
            }
            self.check_suffix_link(node)?;
        }
        Ok(())
    }

    fn check_suffix_link(&self, node: NodeId) -> Result<()> {
        let link = self.suffix(node);
        if link == NIL || self.nodes.is_leaf(link) {
            return Err(BicomError::TreeCorrupted("missing suffix link"));
        }
        let depth = self.depth(node);
        if self.depth(link) + 1 != depth {
            return Err(BicomError::TreeCorrupted("suffix link depth mismatch"));
        }
        let a = self.some_leaf(node)?;
        let b = self.some_leaf(link)?;
        for k in 0..depth - 1 {
            let x = self.text[self.wrap_add(a, k + 1) as usize];
            let y = self.text[self.wrap_add(b, k) as usize];
            if x != y {
                return Err(BicomError::TreeCorrupted("suffix link label mismatch"));
            }
        }
        Ok(())
    }

    /// Any leaf below `node`.
    fn some_leaf(&self, mut node: NodeId) -> Result<NodeId> {
        while !self.nodes.is_leaf(node) {
            node = self.first_child(node);
            if node == NIL {
                return Err(BicomError::TreeCorrupted("internal node without children"));
            }
        }
        Ok(node)
    }

    /// Length of the suffix starting at `leaf`.
    fn leaf_len(&self, leaf: NodeId) -> u32 {
        match self.wrap_sub(self.front, leaf) {
            0 => self.size,
            n => n,
        }
    }
}

impl ArithmeticModel for SuffixTreeModel {
    fn encode(&mut self, symbol: u8, coder: &mut IntervalEncoder) -> Result<()> {
        self.walk(symbol, coder)?;
        self.update(symbol)
    }

    fn decode(&mut self, coder: &mut IntervalDecoder<'_>) -> Result<u8> {
        let symbol = self.walk(0, coder)?;
        self.update(symbol)?;
        Ok(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::{ArithmeticDecoder, ArithmeticEncoder};
    use crate::stream::{read_all, MemorySource};

    fn feed(model: &mut SuffixTreeModel, data: &[u8]) {
        for &b in data {
            model.update(b).unwrap();
        }
    }

    fn lcg_bytes(len: usize, seed: u32, alphabet: u8) -> Vec<u8> {
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((x >> 16) % alphabet as u32) as u8
            })
            .collect()
    }

    #[test]
    fn test_predictor_tables_initialised() {
        let model = SuffixTreeModel::new(64);
        assert_eq!(model.det[0][0], BitPredictor::new(25, 39));
        assert_eq!(model.det[19][5], BitPredictor::new(61, 3));
        assert_eq!(model.escape[0][3], BitPredictor::new(63, 1));
        assert_eq!(model.escape2[62][6], BitPredictor::new(1, 63));
    }

    #[test]
    fn test_window_is_clamped() {
        assert_eq!(SuffixTreeModel::new(1).window(), MIN_WINDOW as usize);
        assert_eq!(SuffixTreeModel::new(usize::MAX).window(), MAX_WINDOW as usize);
    }

    #[test]
    fn test_invariants_while_growing() {
        let mut model = SuffixTreeModel::new(4096);
        let text = b"mississippi missouri mississippi misses";
        for &b in text.iter() {
            model.update(b).unwrap();
            model.check_invariants().unwrap();
        }
        assert_eq!(model.len(), text.len());
    }

    #[test]
    fn test_invariants_across_evictions() {
        let mut model = SuffixTreeModel::new(32);
        let data = lcg_bytes(600, 7, 3);
        for &b in &data {
            model.update(b).unwrap();
            model.check_invariants().unwrap();
        }
        assert_eq!(model.len(), 32);
    }

    #[test]
    fn test_invariants_with_long_repeats() {
        let mut model = SuffixTreeModel::new(64);
        let mut data = vec![b'a'; 200];
        data.extend_from_slice(&lcg_bytes(100, 3, 2));
        data.extend(std::iter::repeat(b"abc").take(50).flatten());
        for &b in &data {
            model.update(b).unwrap();
            model.check_invariants().unwrap();
        }
    }

    #[test]
    fn test_reset_matches_fresh_model() {
        let data = lcg_bytes(300, 11, 5);
        let mut used = SuffixTreeModel::new(128);
        feed(&mut used, &data);
        used.reset();
        assert!(used.is_empty());
        assert_eq!(used.nodes.live_branches(), 1);

        let encode = |model: SuffixTreeModel| {
            read_all(ArithmeticEncoder::new(model, MemorySource::new(&data))).unwrap()
        };
        assert_eq!(encode(used), encode(SuffixTreeModel::new(128)));
    }

    #[test]
    fn test_model_roundtrip_small_window() {
        let data = lcg_bytes(3000, 5, 7);
        let coded = read_all(ArithmeticEncoder::new(
            SuffixTreeModel::new(256),
            MemorySource::new(&data),
        ))
        .unwrap();
        let decoded = read_all(ArithmeticDecoder::new(
            SuffixTreeModel::new(256),
            MemorySource::new(&coded),
        ))
        .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_repetitive_input_compresses() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(20_000)
            .collect();
        let coded = read_all(ArithmeticEncoder::new(
            SuffixTreeModel::new(1 << 16),
            MemorySource::new(&data),
        ))
        .unwrap();
        assert!(coded.len() < data.len() / 20, "{} bytes", coded.len());
    }
}

//! Conditional-inclusion stack for `#if`/`#ifdef`/`#ifndef`/`#elif`/`#else`/
//! `#endif` (spec §4.1): two parallel stacks, `skipping` and
//! `any_branch_true`, so `#elif` only re-evaluates its condition when no
//! earlier branch in the chain has already been taken, and a nested `#if`
//! encountered while already skipping is inert for the whole of its own
//! `#elif`/`#else` chain.

#[derive(Debug, Clone, Copy)]
struct Frame {
    skipping: bool,
    any_branch_true: bool,
    /// True once a plain `#else` has been seen for this frame, so a
    /// duplicate `#else` can be rejected.
    saw_else: bool,
}

#[derive(Default)]
pub struct ConditionalStack {
    frames: Vec<Frame>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether output/macro-expansion should be suppressed right now.
    pub fn is_skipping(&self) -> bool {
        self.frames.iter().any(|f| f.skipping)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// `#if`/`#ifdef`/`#ifndef`: `condition` is the already-evaluated truth
    /// value (irrelevant when the enclosing context is already skipping —
    /// callers should avoid evaluating it in that case to not require
    /// defined macros, but passing `false` is also safe since the pushed
    /// frame is forced inert either way).
    pub fn push_if(&mut self, condition: bool) {
        if self.is_skipping() {
            // Spec §4.1: nested #if while skipping always pushes
            // (skipping=true, any_branch_true=true) so its own #else/#elif
            // stay inert.
            self.frames.push(Frame {
                skipping: true,
                any_branch_true: true,
                saw_else: false,
            });
        } else {
            self.frames.push(Frame {
                skipping: !condition,
                any_branch_true: condition,
                saw_else: false,
            });
        }
    }

    /// `#elif cond`: only re-evaluates when this frame hasn't taken a
    /// branch yet; the caller supplies `eval` lazily since evaluating the
    /// condition may require macro expansion that should be skipped for
    /// frames that are inert regardless.
    pub fn elif(&mut self, eval: impl FnOnce() -> bool) -> Result<(), &'static str> {
        let was_outer_skipping = self.frames[..self.frames.len().saturating_sub(1)]
            .iter()
            .any(|f| f.skipping);
        let frame = self
            .frames
            .last_mut()
            .ok_or("#elif without matching #if")?;
        if frame.saw_else {
            return Err("#elif after #else");
        }
        if was_outer_skipping || frame.any_branch_true {
            frame.skipping = true;
        } else {
            let cond = eval();
            frame.skipping = !cond;
            frame.any_branch_true = cond;
        }
        Ok(())
    }

    /// `#else`: flips to active iff no prior branch in this chain was true
    /// and the enclosing context isn't itself skipping.
    pub fn else_branch(&mut self) -> Result<(), &'static str> {
        let was_outer_skipping = self.frames[..self.frames.len().saturating_sub(1)]
            .iter()
            .any(|f| f.skipping);
        let frame = self
            .frames
            .last_mut()
            .ok_or("#else without matching #if")?;
        if frame.saw_else {
            return Err("duplicate #else");
        }
        frame.saw_else = true;
        if was_outer_skipping || frame.any_branch_true {
            frame.skipping = true;
        } else {
            frame.skipping = false;
            frame.any_branch_true = true;
        }
        Ok(())
    }

    pub fn endif(&mut self) -> Result<(), &'static str> {
        self.frames.pop().map(|_| ()).ok_or("#endif without matching #if")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_if_else() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false);
        assert!(stack.is_skipping());
        stack.else_branch().unwrap();
        assert!(!stack.is_skipping());
        stack.endif().unwrap();
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn elif_only_fires_when_prior_branches_false() {
        let mut stack = ConditionalStack::new();
        stack.push_if(true);
        assert!(!stack.is_skipping());
        stack.elif(|| true).unwrap();
        // #if already true, so #elif must stay inert even though its own
        // condition evaluates true.
        assert!(stack.is_skipping());
    }

    #[test]
    fn nested_if_inside_skipped_branch_is_always_inert() {
        let mut stack = ConditionalStack::new();
        stack.push_if(false); // outer skipping
        stack.push_if(true); // nested: forced skipping regardless
        assert!(stack.is_skipping());
        // nested #else must stay inert too
        stack.else_branch().unwrap();
        assert!(stack.is_skipping());
        stack.endif().unwrap();
        assert!(stack.is_skipping()); // back to outer, still skipping
        stack.endif().unwrap();
    }

    #[test]
    fn endif_without_if_is_an_error() {
        let mut stack = ConditionalStack::new();
        assert!(stack.endif().is_err());
    }
}

//! `SharedPtr` and `WeakPtr`, sharing one control block per payload.

mod control_block;
mod shared_ptr;
mod weak_ptr;

pub use shared_ptr::SharedPtr;
pub use weak_ptr::WeakPtr;

#[cfg(test)]
mod tests {
    use super::control_block::live_blocks;
    use super::{SharedPtr, WeakPtr};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn check_counts(strong: &[SharedPtr<u32>], weak: &[WeakPtr<u32>]) {
        for s in strong {
            assert_eq!(s.strong_count(), strong.len());
            assert_eq!(s.weak_count(), weak.len());
            assert_eq!(s.as_ptr(), strong[0].as_ptr());
        }
        for w in weak {
            assert_eq!(w.strong_count(), strong.len());
            assert_eq!(w.weak_count(), weak.len());
            assert_eq!(w.expired(), strong.is_empty());
        }
    }

    #[test]
    fn test_counts_track_bound_pointers() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut strong: Vec<SharedPtr<u32>> = Vec::new();
        let mut weak: Vec<WeakPtr<u32>> = Vec::new();
        let mut generation = 0;
        let before = live_blocks();

        for _ in 0..5_000 {
            if strong.is_empty() && weak.is_empty() {
                generation += 1;
                strong.push(SharedPtr::new(generation));
            }
            match rng.gen_range(0..7) {
                0 if !strong.is_empty() => {
                    let i = rng.gen_range(0..strong.len());
                    let copy = strong[i].clone();
                    strong.push(copy);
                }
                1 if !strong.is_empty() => {
                    let i = rng.gen_range(0..strong.len());
                    let moved = strong[i].take();
                    strong.push(moved);
                }
                2 if !strong.is_empty() => {
                    let i = rng.gen_range(0..strong.len());
                    strong[i].reset();
                }
                3 if !strong.is_empty() => {
                    let i = rng.gen_range(0..strong.len());
                    weak.push(SharedPtr::downgrade(&strong[i]));
                }
                4 if !weak.is_empty() => {
                    let i = rng.gen_range(0..weak.len());
                    let copy = weak[i].clone();
                    weak.push(copy);
                }
                5 if !weak.is_empty() => {
                    let i = rng.gen_range(0..weak.len());
                    strong.push(weak[i].lock());
                }
                6 if !weak.is_empty() => {
                    let i = rng.gen_range(0..weak.len());
                    weak[i].reset();
                }
                _ => {}
            }
            strong.retain(SharedPtr::is_bound);
            weak.retain(WeakPtr::is_bound);
            check_counts(&strong, &weak);
            if let Some(s) = strong.first() {
                assert_eq!(**s, generation);
            }
            let expected = if strong.is_empty() && weak.is_empty() { 0 } else { 1 };
            assert_eq!(live_blocks(), before + expected);
        }
        strong.clear();
        weak.clear();
        assert_eq!(live_blocks(), before);
    }
}

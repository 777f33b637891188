//! Total-order comparison policy injected into every engine.
//!
//! Engines never compare keys with `==`; equality is `Ordering::Equal` from the comparator.

use core::cmp::Ordering;

pub trait Comparator<K: ?Sized> {
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// Compares keys by their [`Ord`] implementation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord + ?Sized> Comparator<K> for NaturalOrder {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Adapts a closure `Fn(&K, &K) -> Ordering` into a [`Comparator`].
#[derive(Copy, Clone, Debug)]
pub struct FnComparator<F>(pub F);

impl<K: ?Sized, F> Comparator<K> for FnComparator<F>
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_closure() {
        let cmp = FnComparator(|a: &i32, b: &i32| b.cmp(a));
        assert_eq!(cmp.compare(&1, &2), Ordering::Greater);
        assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
        assert_eq!(NaturalOrder.compare("b", "b"), Ordering::Equal);
    }
}

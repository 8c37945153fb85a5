/// Rayon or sequential execution, selected by the `parallel` feature.
///
/// With `parallel` on (the default), rayon's parallel iterators are
/// re-exported. With it off, a minimal sequential stand-in exposes the
/// same `into_par_iter()` entry point so algorithm code compiles
/// unchanged; the rest of each chain resolves to plain `Iterator`
/// methods.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;

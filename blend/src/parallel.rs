//! Data-parallel-for over image rows (§5 concurrency model).
//!
//! Two shapes cover every parallel region the core needs: a read-only
//! callback indexed by row (`parallel_rows`), and a callback that owns one
//! disjoint mutable row of a buffer at a time (`parallel_rows_mut`). Both are
//! serial by default; the `rayon` feature swaps in a work-stealing pool
//! without changing call sites. Per §5, "a purely serial implementation is
//! also conforming" and no kernel here needs a lock: every row's output
//! depends only on its own bounded stencil of inputs.

/// Run `f` once per row in `0..row_count`. Rows have no data dependencies on
/// each other, so implementations may run them in any order or concurrently.
pub fn parallel_rows<F>(row_count: usize, f: F)
where
  F: Fn(usize) + Sync,
{
  #[cfg(feature = "rayon")]
  {
    use rayon::prelude::*;
    (0..row_count).into_par_iter().for_each(|y| f(y));
  }

  #[cfg(not(feature = "rayon"))]
  {
    for y in 0..row_count {
      f(y);
    }
  }
}

/// Run `f(y, row)` once per `row_width`-sized chunk of `data`, handing each
/// call a disjoint mutable slice so no synchronization is needed inside `f`.
/// Used by the `reduce`/`expand` kernels and the per-level blend combine,
/// whose output pixels never depend on a neighbouring output row.
pub fn parallel_rows_mut<T, F>(data: &mut [T], row_width: usize, f: F)
where
  T: Send,
  F: Fn(usize, &mut [T]) + Sync,
{
  #[cfg(feature = "rayon")]
  {
    use rayon::prelude::*;
    data.par_chunks_mut(row_width).enumerate().for_each(|(y, row)| f(y, row));
  }

  #[cfg(not(feature = "rayon"))]
  {
    for (y, row) in data.chunks_mut(row_width).enumerate() {
      f(y, row);
    }
  }
}

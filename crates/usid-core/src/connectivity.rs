//! Owned connectivity tables.
//!
//! A [`Connectivity`] stores, for each row element, up to `max_degree`
//! target element indices, row-major, padded with
//! [`SKIP_VALUE`](crate::SKIP_VALUE). It is viewed as a field with
//! [`sid`](Connectivity::sid), keyed by a row tag and a slot tag.

use crate::dim::Dim;
use crate::error::{ContractViolation, UsidError};
use crate::fold::SKIP_VALUE;
use crate::sid::{Sid, StorageKind};
use crate::stride::Layout;

/// Fixed-degree element-to-element table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connectivity {
    rows: usize,
    max_degree: usize,
    data: Vec<i32>,
}

impl Connectivity {
    /// Table from row-major `data` of `rows * max_degree` values.
    pub fn new(rows: usize, max_degree: usize, data: Vec<i32>) -> Result<Self, ContractViolation> {
        let expected = rows
            .checked_mul(max_degree)
            .ok_or(ContractViolation::LayoutMismatch {
                expected: usize::MAX,
                actual: data.len(),
            })?;
        if data.len() != expected {
            return Err(ContractViolation::LayoutMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            rows,
            max_degree,
            data,
        })
    }

    /// Table from ragged rows, padded with [`SKIP_VALUE`] to the longest row.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Self {
        let max_degree = rows.iter().map(|r| r.as_ref().len()).max().unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * max_degree);
        for r in rows {
            let r = r.as_ref();
            data.extend_from_slice(r);
            data.extend(std::iter::repeat_n(SKIP_VALUE, max_degree - r.len()));
        }
        Self {
            rows: rows.len(),
            max_degree,
            data,
        }
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of slots per row.
    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Slots of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= self.rows()`.
    pub fn row(&self, row: usize) -> &[i32] {
        &self.data[row * self.max_degree..(row + 1) * self.max_degree]
    }

    /// Row-major values.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Whether any slot holds [`SKIP_VALUE`].
    pub fn has_skip_values(&self) -> bool {
        self.data.contains(&SKIP_VALUE)
    }

    /// Check every value is [`SKIP_VALUE`] or lies in `[0, target_count)`.
    pub fn validate(&self, target_count: usize) -> Result<(), UsidError> {
        for (i, &v) in self.data.iter().enumerate() {
            let ok = v == SKIP_VALUE || (v >= 0 && (v as usize) < target_count);
            if !ok {
                return Err(UsidError::IndexOutOfRange {
                    row: Some(i / self.max_degree),
                    slot: i % self.max_degree,
                    index: i64::from(v),
                    bound: target_count,
                });
            }
        }
        Ok(())
    }

    /// View as a field with `Row` outermost and `Slot` innermost.
    pub fn sid<Row: Dim, Slot: Dim>(&self, storage: StorageKind) -> Result<Sid<'_, i32>, ContractViolation> {
        let layout = Layout::new()
            .dim::<Row>(self.rows)
            .dim::<Slot>(self.max_degree);
        Sid::new(&self.data, &layout, storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::{H, N};
    use crate::sid::max_degree;

    #[test]
    fn from_rows_pads_with_sentinel() {
        let c = Connectivity::from_rows(&[vec![0, 1, 2], vec![3], vec![]]);
        assert_eq!(c.rows(), 3);
        assert_eq!(c.max_degree(), 3);
        assert_eq!(c.row(1), &[3, SKIP_VALUE, SKIP_VALUE]);
        assert_eq!(c.row(2), &[SKIP_VALUE; 3]);
        assert!(c.has_skip_values());
    }

    #[test]
    fn new_checks_length() {
        assert_eq!(
            Connectivity::new(2, 3, vec![0; 5]).unwrap_err(),
            ContractViolation::LayoutMismatch {
                expected: 6,
                actual: 5
            }
        );
        assert!(!Connectivity::new(2, 2, vec![0, 1, 1, 0]).unwrap().has_skip_values());
    }

    #[test]
    fn validate_reports_row_and_slot() {
        let c = Connectivity::from_rows(&[[0, 1], [1, 4]]);
        assert!(c.validate(5).is_ok());
        assert_eq!(
            c.validate(4).unwrap_err(),
            UsidError::IndexOutOfRange {
                row: Some(1),
                slot: 1,
                index: 4,
                bound: 4
            }
        );
        let negative = Connectivity::from_rows(&[[-2]]);
        assert!(negative.validate(10).is_err());
    }

    #[test]
    fn sid_exposes_degree_as_bound() {
        let c = Connectivity::from_rows(&[[0, 1], [1, 2], [2, 0]]);
        let sid = c.sid::<H, N>(StorageKind::Host).unwrap();
        assert_eq!(max_degree::<N, _>(&sid).unwrap(), 2);
        assert_eq!(sid.upper_bound::<H>().unwrap(), 3);
        assert_eq!(sid.shifted::<H>(2).unwrap().shifted::<N>(1).unwrap().origin().get(), 0);
    }
}

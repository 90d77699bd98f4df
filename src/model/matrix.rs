use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul};

/// Dense row-major matrix. A layer's input is a 1×n row vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
        // Uniform samples in (0, 1] avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// He initialization: samples from N(0, sqrt(2 / rows)), where `rows`
    /// is the fan-in of a weight matrix shaped (inputs, outputs).
    pub fn he<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let std_dev = (2.0 / rows.max(1) as f64).sqrt();
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = Matrix::sample_standard_normal(rng) * std_dev;
            }
        }
        res
    }

    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map(|r| r.len()).unwrap_or(0),
            data
        }
    }

    /// Wraps a vector as a 1×n row.
    pub fn row(values: Vec<f64>) -> Matrix {
        Matrix::from_data(vec![values])
    }

    /// True when `rows`/`cols` agree with the stored data.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.rows && self.data.iter().all(|r| r.len() == self.cols)
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: Self) -> Self::Output {
        if self.rows != rhs.rows || self.cols != rhs.cols {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, self.cols);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[i][j] = self.data[i][j] + rhs.data[i][j];
            }
        }

        res
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);

        for i in 0..res.rows {
            for j in 0..res.cols {
                let mut sum = 0.0;

                for k in 0..self.cols {
                    sum += self.data[i][k] * rhs.data[k][j];
                }

                res.data[i][j] = sum;
            }
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn row_vector_times_weights() {
        let x = Matrix::row(vec![1.0, 2.0]);
        let w = Matrix::from_data(vec![vec![1.0, 0.0, -1.0], vec![0.5, 1.0, 2.0]]);
        assert_eq!((&x * &w).data, vec![vec![2.0, 2.0, 3.0]]);
    }

    #[test]
    fn he_init_is_seedable_and_shaped() {
        let a = Matrix::he(784, 16, &mut StdRng::seed_from_u64(7));
        let b = Matrix::he(784, 16, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        assert!(a.is_consistent());
        assert_eq!((a.rows, a.cols), (784, 16));
    }

    #[test]
    fn inconsistent_shape_is_detected() {
        let m = Matrix { rows: 2, cols: 2, data: vec![vec![0.0, 1.0]] };
        assert!(!m.is_consistent());
    }
}

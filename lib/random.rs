//! Random dense arrays for building test networks.
//!
//! All functions take the generator explicitly, so that seeded generators give
//! reproducible networks.

use ndarray as nd;
use num_complex::Complex;
use num_traits::Float;
use rand::{
    Rng,
    distributions::{ Distribution, Standard, uniform::SampleUniform },
};

/// Fill an array of the given shape with samples from the [`Standard`]
/// distribution, e.g. uniform on [0, 1) for floats.
pub fn random_array<A, R>(shape: &[usize], rng: &mut R) -> nd::ArrayD<A>
where
    Standard: Distribution<A>,
    R: Rng + ?Sized,
{
    nd::ArrayD::from_shape_simple_fn(shape, || rng.sample(Standard))
}

/// Fill an array of the given shape with samples uniform on [`low`, `high`).
///
/// *Panics if `low >= high`.*
pub fn random_uniform<A, R>(shape: &[usize], low: A, high: A, rng: &mut R)
    -> nd::ArrayD<A>
where
    A: SampleUniform + PartialOrd + Copy,
    R: Rng + ?Sized,
{
    nd::ArrayD::from_shape_simple_fn(shape, || rng.gen_range(low..high))
}

/// Fill an array of the given shape with complex numbers whose real and
/// imaginary parts are each uniform on [-1, 1).
pub fn random_complex<T, R>(shape: &[usize], rng: &mut R)
    -> nd::ArrayD<Complex<T>>
where
    T: Float + SampleUniform,
    R: Rng + ?Sized,
{
    nd::ArrayD::from_shape_simple_fn(shape, || {
        let re = rng.gen_range(-T::one()..T::one());
        let im = rng.gen_range(-T::one()..T::one());
        Complex::new(re, im)
    })
}

//! Cell value trait for generic raster grids

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can live in a raster cell.
///
/// The pipeline uses a small set of concrete types: `u16` for raw
/// digital numbers and QA codes, `u8` for boolean masks, `f32`/`f64`
/// for temperatures, elevations and indices.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Nodata value used when no explicit sentinel is set
    fn default_nodata() -> Self;

    /// Check if this value represents nodata
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is floating point
    fn is_float() -> bool;

    /// Convert to f64 for statistics
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Convert from f64, saturating into the nodata value on failure
    fn from_f64(value: f64) -> Self {
        NumCast::from(value).unwrap_or_else(Self::default_nodata)
    }
}

macro_rules! impl_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_element_int!(u8);
impl_element_int!(u16);
impl_element_int!(i32);
impl_element_float!(f32);
impl_element_float!(f64);

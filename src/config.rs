//! Engine configuration and the tag strides that depend on it.

use std::env;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Tuning knobs of the engine.
///
/// Both parties must use the same configuration: chunking determines the message schedule and
/// the tags of every round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of elements processed by one chunk of a primitive call.
    pub batch_size: usize,
    /// Maximum number of chunks in flight at once.
    pub parallelism: usize,
    /// The hash join routes rows into `2^bucket_bits` buckets.
    pub bucket_bits: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            parallelism: 8,
            bucket_bits: 5,
        }
    }
}

fn env_override<T: std::str::FromStr>(var: &str, value: &mut T) -> Result<(), Error> {
    if let Ok(raw) = env::var(var) {
        *value = raw
            .parse()
            .map_err(|_| Error::Config(format!("{var} must be a number, found `{raw}`")))?;
    }
    Ok(())
}

impl EngineConfig {
    /// The default configuration, overridden by `RELSHARE_BATCH_SIZE`, `RELSHARE_PARALLELISM`
    /// and `RELSHARE_BUCKET_BITS` where set.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        env_override("RELSHARE_BATCH_SIZE", &mut config.batch_size)?;
        env_override("RELSHARE_PARALLELISM", &mut config.parallelism)?;
        env_override("RELSHARE_BUCKET_BITS", &mut config.bucket_bits)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can be used by the engine.
    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if self.parallelism == 0 {
            return Err(Error::Config("parallelism must be at least 1".into()));
        }
        if self.bucket_bits > 16 {
            return Err(Error::Config(format!(
                "bucket_bits must be at most 16, found {}",
                self.bucket_bits
            )));
        }
        Ok(())
    }

    /// Number of hash join buckets.
    pub fn bucket_count(&self) -> usize {
        1 << self.bucket_bits
    }

    /// Number of chunks a primitive call over `len` elements is split into.
    pub fn chunks(&self, len: usize) -> u64 {
        len.div_ceil(self.batch_size.max(1)) as u64
    }

    /// Tags consumed by a secure AND over `len` elements.
    pub fn and_tag_stride(&self, len: usize) -> u64 {
        self.chunks(len)
    }

    /// Tags consumed by a secure select over `len` elements.
    pub fn select_tag_stride(&self, len: usize) -> u64 {
        self.and_tag_stride(len)
    }

    /// Tags consumed by a secure equality over `len` pairs of `width`-bit values.
    pub fn eq_tag_stride(&self, len: usize, width: u32) -> u64 {
        self.chunks(len) * eq_rounds(width)
    }

    /// Tags consumed by a secure less-than over `len` pairs of `width`-bit values.
    pub fn lt_tag_stride(&self, len: usize, width: u32) -> u64 {
        self.chunks(len) * lt_rounds(width)
    }

    /// Tags consumed by a boolean to arithmetic conversion of `len` bits.
    pub fn bool_to_arith_tag_stride(&self, len: usize) -> u64 {
        self.arith_mul_tag_stride(len)
    }

    /// Tags consumed by a multiplication of `len` pairs of arithmetic shares.
    pub fn arith_mul_tag_stride(&self, len: usize) -> u64 {
        self.chunks(len)
    }

    /// Tags consumed by an arithmetic to boolean conversion of `len` values of `width` bits.
    pub fn arith_to_bool_tag_stride(&self, len: usize, width: u32) -> u64 {
        self.chunks(len) * lt_rounds(width)
    }

    /// Tags consumed by opening a vector of shares.
    pub fn open_tag_stride(&self) -> u64 {
        1
    }

    /// Tags consumed by a tree AND of `count` columns of `len` elements each.
    pub fn and_all_tag_stride(&self, count: usize, len: usize) -> u64 {
        let mut count = count;
        let mut stride = 0;
        while count > 1 {
            stride += self.and_tag_stride(count / 2 * len);
            count = count.div_ceil(2);
        }
        stride
    }
}

/// `ceil(log2(width))`, the depth of a tree over `width` leaves.
pub(crate) fn ceil_log2(width: u32) -> u32 {
    if width <= 1 {
        0
    } else {
        u32::BITS - (width - 1).leading_zeros()
    }
}

/// Rounds of a secure equality on `width` bits.
pub(crate) fn eq_rounds(width: u32) -> u64 {
    u64::from(ceil_log2(width))
}

/// Rounds of a secure less-than (and of the adder) on `width` bits.
pub(crate) fn lt_rounds(width: u32) -> u64 {
    1 + u64::from(ceil_log2(width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_depths() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(32), 5);
        assert_eq!(ceil_log2(33), 6);
        assert_eq!(ceil_log2(64), 6);
    }

    #[test]
    fn strides_follow_chunking() {
        let config = EngineConfig {
            batch_size: 10,
            ..Default::default()
        };
        assert_eq!(config.chunks(0), 0);
        assert_eq!(config.chunks(10), 1);
        assert_eq!(config.chunks(11), 2);
        assert_eq!(config.eq_tag_stride(25, 32), 3 * 5);
        assert_eq!(config.lt_tag_stride(25, 1), 3);
        // 5 columns: 2 pairs, then 3 columns: 1 pair, then 2 columns: 1 pair
        assert_eq!(config.and_all_tag_stride(5, 10), 2 + 1 + 1);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let config = EngineConfig {
            bucket_bits: 17,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        let config = EngineConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(EngineConfig::default().validate().is_ok());
    }
}

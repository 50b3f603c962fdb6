macro_rules! impl_from_into_u64 {
    ($main: ident) => {
        impl From<u64> for $main {
            fn from(n: u64) -> $main {
                $main(n)
            }
        }

        impl From<$main> for u64 {
            fn from(from: $main) -> u64 {
                from.0
            }
        }

        impl $main {
            pub const fn as_u64(&self) -> u64 {
                self.0
            }
        }
    };
}

macro_rules! impl_from_into_usize {
    ($main: ident) => {
        impl From<usize> for $main {
            fn from(n: usize) -> $main {
                $main(n as u64)
            }
        }

        impl $main {
            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

macro_rules! impl_math_between {
    ($main: ident, $other: ident) => {
        impl PartialOrd<$other> for $main {
            /// Utilizes `partial_cmp` on the underlying `u64`.
            fn partial_cmp(&self, other: &$other) -> Option<Ordering> {
                Some(self.0.cmp(&u64::from(*other)))
            }
        }

        impl PartialEq<$other> for $main {
            fn eq(&self, other: &$other) -> bool {
                self.0 == u64::from(*other)
            }
        }

        impl Add<$other> for $main {
            type Output = $main;

            fn add(self, other: $other) -> $main {
                $main::from(self.0.saturating_add(u64::from(other)))
            }
        }

        impl AddAssign<$other> for $main {
            fn add_assign(&mut self, other: $other) {
                self.0 = self.0.saturating_add(u64::from(other));
            }
        }

        impl Sub<$other> for $main {
            type Output = $main;

            fn sub(self, other: $other) -> $main {
                $main::from(self.0.saturating_sub(u64::from(other)))
            }
        }

        impl SubAssign<$other> for $main {
            fn sub_assign(&mut self, other: $other) {
                self.0 = self.0.saturating_sub(u64::from(other));
            }
        }

        impl Div<$other> for $main {
            type Output = $main;

            /// Panics on division by zero, like the `u64` implementation.
            fn div(self, rhs: $other) -> $main {
                let rhs: u64 = rhs.into();
                $main::from(self.0 / rhs)
            }
        }

        impl Rem<$other> for $main {
            type Output = $main;

            fn rem(self, modulus: $other) -> $main {
                let modulus: u64 = modulus.into();
                $main::from(self.0 % modulus)
            }
        }
    };
}

macro_rules! impl_safe_math {
    ($main: ident) => {
        impl $main {
            pub fn safe_add<T: Into<u64>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_add(other.into()).map($main)
            }

            pub fn safe_sub<T: Into<u64>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_sub(other.into()).map($main)
            }

            pub fn safe_mul<T: Into<u64>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_mul(other.into()).map($main)
            }

            pub fn safe_div<T: Into<u64>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_div(other.into()).map($main)
            }

            pub fn safe_rem<T: Into<u64>>(&self, other: T) -> Result<$main, ArithError> {
                self.0.safe_rem(other.into()).map($main)
            }
        }
    };
}

macro_rules! impl_display {
    ($type: ident) => {
        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl slog::Value for $type {
            fn serialize(
                &self,
                record: &slog::Record,
                key: slog::Key,
                serializer: &mut dyn slog::Serializer,
            ) -> slog::Result {
                slog::Value::serialize(&self.0, record, key, serializer)
            }
        }
    };
}

macro_rules! impl_debug {
    ($type: ident) => {
        impl fmt::Debug for $type {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self.0)
            }
        }
    };
}

macro_rules! impl_common {
    ($type: ident) => {
        impl_from_into_u64!($type);
        impl_from_into_usize!($type);
        impl_math_between!($type, $type);
        impl_math_between!($type, u64);
        impl_safe_math!($type);
        impl_display!($type);
        impl_debug!($type);
    };
}

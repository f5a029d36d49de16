#[cfg(feature = "log")]
macro_rules! net_log {
    (trace, $($arg:expr),*) => { log::trace!($($arg),*) };
    (debug, $($arg:expr),*) => { log::debug!($($arg),*) };
}

#[cfg(all(feature = "defmt", not(feature = "log")))]
macro_rules! net_log {
    (trace, $($arg:expr),*) => { defmt::trace!($($arg),*) };
    (debug, $($arg:expr),*) => { defmt::debug!($($arg),*) };
}

#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! net_log {
    ($level:ident, $($arg:expr),*) => {{ $( let _ = $arg; )* }};
}

macro_rules! net_trace {
    ($($arg:expr),*) => (net_log!(trace, $($arg),*));
}

macro_rules! net_debug {
    ($($arg:expr),*) => (net_log!(debug, $($arg),*));
}

macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*,
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}

macro_rules! get {
    ($buffer:expr, field: $field:expr) => {
        $buffer.as_ref()[$field]
    };
    ($buffer:expr, field: $field:expr, mask: $mask:expr) => {
        $buffer.as_ref()[$field] & $mask
    };
    ($buffer:expr, field: $field:expr, shift: $shift:expr, mask: $mask:expr) => {
        ($buffer.as_ref()[$field] >> $shift) & $mask
    };
    ($buffer:expr, bool, field: $field:expr, shift: $shift:expr, mask: $mask:expr) => {
        (($buffer.as_ref()[$field] >> $shift) & $mask) == 0b1
    };
    ($buffer:expr, u16, field: $field:expr) => {
        NetworkEndian::read_u16(&$buffer.as_ref()[$field])
    };
    ($buffer:expr, u32, field: $field:expr) => {
        NetworkEndian::read_u32(&$buffer.as_ref()[$field])
    };
    ($buffer:expr, into: $into:ty, field: $field:expr) => {
        <$into>::from($buffer.as_ref()[$field])
    };
    ($buffer:expr, into: $into:ty, field: $field:expr, shift: $shift:expr, mask: $mask:expr) => {
        <$into>::from(($buffer.as_ref()[$field] >> $shift) & $mask)
    };
    ($buffer:expr, into: $into:ty, fun: $fun:ident, field: $field:expr) => {
        <$into>::$fun(&$buffer.as_ref()[$field])
    };
}

macro_rules! set {
    ($buffer:expr, $value:expr, field: $field:expr) => {
        $buffer.as_mut()[$field] = $value
    };
    ($buffer:expr, $value:expr, field: $field:expr, mask: $mask:expr) => {{
        let raw = $buffer.as_ref()[$field] & !$mask;
        $buffer.as_mut()[$field] = raw | ($value & $mask);
    }};
    ($buffer:expr, $value:expr, bool, field: $field:expr, shift: $shift:expr, mask: $mask:expr) => {{
        let raw = $buffer.as_ref()[$field] & !($mask << $shift);
        $buffer.as_mut()[$field] = raw | (($value as u8) << $shift);
    }};
    ($buffer:expr, $value:expr, u16, field: $field:expr) => {
        NetworkEndian::write_u16(&mut $buffer.as_mut()[$field], $value)
    };
    ($buffer:expr, $value:expr, u32, field: $field:expr) => {
        NetworkEndian::write_u32(&mut $buffer.as_mut()[$field], $value)
    };
    ($buffer:expr, address: $address:expr, field: $field:expr) => {
        $buffer.as_mut()[$field].copy_from_slice($address.as_bytes())
    };
}

use std::fmt;

/// ヒープ内のブロックを識別するためのアドレス.
///
/// 値はアリーナ先頭からの**バイト単位**のオフセットで、常にブロックのペイロード先頭を指す.
/// 生のポインタではないので、アリーナのバッファが再配置されても無効化されない.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Address(u32);
impl Address {
    /// 取り得るアドレスの最大値.
    pub const MAX: u32 = u32::MAX;

    /// アドレスの値を返す.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// `value`を対応する位置のアドレスに変換する.
    ///
    /// `value`の値が32bit以内に収まらない場合には`None`が返される.
    pub fn from_usize(value: usize) -> Option<Self> {
        if value <= Self::MAX as usize {
            Some(Address(value as u32))
        } else {
            None
        }
    }

    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}
impl From<u32> for Address {
    fn from(from: u32) -> Self {
        Address(from)
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        assert_eq!(Address::from_usize(0).map(|a| a.as_u32()), Some(0));
        assert_eq!(
            Address::from_usize(Address::MAX as usize).map(|a| a.as_u32()),
            Some(Address::MAX)
        );
        if let Some(too_large) = (Address::MAX as usize).checked_add(1) {
            assert_eq!(Address::from_usize(too_large), None);
        }
        assert_eq!(Address::from(16).as_usize(), 16);
        assert_eq!(Address::from(48).to_string(), "0x30");
    }
}

//! 境界タグ.
//!
//! 各ブロックの先頭(ヘッダ)と末尾(フッタ)には、同じ内容の`Tag`が書き込まれる.
use byteorder::{ByteOrder, NativeEndian};

/// ブロックのサイズ(ワード単位)と割当済みフラグを一つの32bit整数に詰め込んだ境界タグ.
///
/// ```text
///  31                              1   0
/// +----------------------------------+---+
/// |     size_words (常に偶数)         | A |
/// +----------------------------------+---+
/// ```
///
/// サイズは常にダブルワードの倍数(i.e., 偶数ワード)なので、最下位bitは割当済みフラグに転用できる.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(u32);
impl Tag {
    /// タグを表現するのに必要なバイト数.
    pub const SIZE: usize = 4;

    /// 番兵ブロック用のタグ (サイズ`0`、割当済み).
    pub const SENTINEL: Tag = Tag(1);

    /// `size_words`と`allocated`をエンコードしたタグを生成する.
    ///
    /// # Panics
    ///
    /// `size_words`が奇数の場合には、現在のスレッドがパニックする.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagalloc::tag::Tag;
    ///
    /// let tag = Tag::new(6, true);
    /// assert_eq!(tag.size_words(), 6);
    /// assert!(tag.is_allocated());
    /// assert_eq!(tag.as_u32(), 7);
    /// ```
    pub fn new(size_words: u32, allocated: bool) -> Self {
        assert_eq!(size_words % 2, 0, "size_words={}", size_words);
        Tag(size_words | allocated as u32)
    }

    /// 生の32bit値からタグを復元する.
    pub fn from_u32(value: u32) -> Self {
        Tag(value)
    }

    /// タグの生の値を返す.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// ブロックのサイズ(ワード単位)を返す.
    ///
    /// 最下位bitはマスクされる.
    pub fn size_words(self) -> u32 {
        self.0 & !1
    }

    /// ブロックが割当済みかどうかを返す.
    pub fn is_allocated(self) -> bool {
        self.0 & 1 == 1
    }

    /// 番兵ブロックのタグかどうかを返す.
    pub fn is_sentinel(self) -> bool {
        self.size_words() == 0
    }

    /// `bytes`の先頭4バイトからタグを読み込む.
    ///
    /// # Panics
    ///
    /// `bytes`の長さが`Tag::SIZE`未満の場合には、現在のスレッドがパニックする.
    pub fn read_from(bytes: &[u8]) -> Self {
        Tag(NativeEndian::read_u32(bytes))
    }

    /// `bytes`の先頭4バイトにタグを書き込む.
    ///
    /// # Panics
    ///
    /// `bytes`の長さが`Tag::SIZE`未満の場合には、現在のスレッドがパニックする.
    pub fn write_to(self, bytes: &mut [u8]) {
        NativeEndian::write_u32(bytes, self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let tag = Tag::new(4, false);
        assert_eq!(tag.size_words(), 4);
        assert!(!tag.is_allocated());
        assert!(!tag.is_sentinel());

        let tag = Tag::new(0xFFFF_FFFE, true);
        assert_eq!(tag.size_words(), 0xFFFF_FFFE);
        assert!(tag.is_allocated());

        assert!(Tag::SENTINEL.is_sentinel());
        assert!(Tag::SENTINEL.is_allocated());
        assert_eq!(Tag::SENTINEL, Tag::new(0, true));
    }

    #[test]
    fn allocated_bit_is_masked_off_from_size() {
        let tag = Tag::from_u32(2 | 1);
        assert_eq!(tag.size_words(), 2);
        assert!(tag.is_allocated());
    }

    #[test]
    fn read_write_works() {
        let mut buf = [0; 8];
        Tag::new(10, true).write_to(&mut buf[4..]);
        assert_eq!(buf[..4], [0; 4]);
        assert_eq!(Tag::read_from(&buf[4..]), Tag::new(10, true));
    }

    #[test]
    #[should_panic]
    fn odd_size_panics() {
        Tag::new(3, false);
    }
}

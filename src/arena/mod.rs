//! ヒープの唯一の記憶領域供給源であるアリーナのインタフェース定義と実装群.
//!
//! このモジュールは[Heap](../heap/struct.Heap.html)が管理対象とする
//! 連続したバイト列を提供する.
pub use self::memory::MemoryArena;
pub use self::slice::SliceArena;

use crate::Result;

mod memory;
mod slice;

/// 単調に拡張可能な連続したバイト列を表すトレイト.
///
/// プログラムブレーク(`sbrk(2)`)に相当する機能を抽象化したもので、
/// 提供するのは「末尾に`N`バイト追加する」操作のみ.
/// 一度拡張された領域が縮小されることはない.
///
/// アリーナのバッファそのものは拡張時に再配置されても構わない.
/// ヒープ側はアリーナ先頭からのオフセットのみを保持しているため、影響を受けない.
pub trait Arena {
    /// アリーナを`bytes`バイト分拡張する.
    ///
    /// 結果として、拡張前の終端位置(i.e., 新たに利用可能になった領域の開始オフセット)が返される.
    /// 新たに利用可能になった領域の内容は未定義.
    ///
    /// # Errors
    ///
    /// 拡張後のサイズが上限を超える場合には、種類が`ErrorKind::ArenaExhausted`のエラーが返される.
    /// この場合、アリーナの状態は変化しない.
    fn grow(&mut self, bytes: usize) -> Result<usize>;

    /// 現在までに拡張されたバイト数を返す.
    fn len(&self) -> usize;

    /// アリーナが拡張可能な最大バイト数を返す.
    fn limit(&self) -> usize;

    /// 拡張済みの領域全体を返す.
    fn as_bytes(&self) -> &[u8];

    /// 拡張済みの領域全体を、書き込み可能な形で返す.
    fn as_bytes_mut(&mut self) -> &mut [u8];

    /// まだ一度も拡張されていないかどうかを判定する.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use trackable::error::TrackableError;

/// crate固有のエラー型.
#[derive(Debug, Clone, TrackableError)]
pub struct Error(TrackableError<ErrorKind>);

/// 発生し得るエラーの種別.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// アリーナをこれ以上拡張できない.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者が不要なブロックを解放した上でリトライする
    /// - より大きな上限を持つアリーナでヒープを構築し直す
    ArenaExhausted,

    /// サイズが`0`の割当要求.
    ///
    /// 致命的なエラーではなく、単に「割当なし」を意味する.
    ZeroSizeRequest,

    /// 割当済みブロックのペイロード先頭ではないアドレスが解放(ないしリサイズ)対象に指定された.
    ///
    /// 二重解放や、このヒープが返したことのないアドレスの指定が該当する.
    /// このエラーが返された場合、ヒープ内のタグには一切変更は加えられていない.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正する
    InvalidFree,

    /// 入力が不正.
    ///
    /// # 典型的な対応策
    ///
    /// - 利用者側のプログラムを修正して入力を正しくする
    InvalidInput,

    /// ヒープの内部状態が不整合に陥っている.
    ///
    /// タグが壊れている(e.g., ヘッダとフッタが一致しない、範囲外を指すサイズ)ことを示している.
    ///
    /// # 典型的な対応策
    ///
    /// - バグ修正を行ってプログラムを更新する
    InconsistentState,

    /// その他エラー.
    Other,
}
impl trackable::error::ErrorKind for ErrorKind {}

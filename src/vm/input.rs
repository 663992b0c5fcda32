//! 键盘命令面：把按键折算为类型化命令，与具体输入设备解耦
//!
//! 取代字符串键名沿树爬升找处理器的做法：命令封闭枚举，去向由会话状态决定

use serde::Serialize;

/// 抽象按键（宿主负责从它的输入设备折算过来）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Escape,
    Space,
    ArrowLeft,
    ArrowUp,
    ArrowRight,
    ArrowDown,
}

/// 会话能处理的全部命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Ctrl+Space 打开路径搜索
    OpenSearch,
    /// Enter 提交查询或收掉浮层
    Submit,
    /// Escape 收掉浮层
    Dismiss,
    /// 搜索框聚焦时的方向键翻历史
    HistoryUp,
    HistoryDown,
    /// Ctrl+方向键驱动焦点导航
    NavPrev,
    NavNext,
    NavIn,
    NavOut,
}

/// 组合键到命令的映射；search_focused决定裸方向键的语义
pub fn map_key(key: Key, ctrl: bool, search_focused: bool) -> Option<Command> {
    match (ctrl, key) {
        (true, Key::Space) => Some(Command::OpenSearch),
        (true, Key::ArrowUp) => Some(Command::NavPrev),
        (true, Key::ArrowDown) => Some(Command::NavNext),
        (true, Key::ArrowRight) => Some(Command::NavIn),
        (true, Key::ArrowLeft) => Some(Command::NavOut),
        (false, Key::Enter) => Some(Command::Submit),
        (false, Key::Escape) => Some(Command::Dismiss),
        (false, Key::ArrowUp) if search_focused => Some(Command::HistoryUp),
        (false, Key::ArrowDown) if search_focused => Some(Command::HistoryDown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_space_opens_search() {
        assert_eq!(map_key(Key::Space, true, false), Some(Command::OpenSearch));
        assert_eq!(map_key(Key::Space, false, false), None, "裸空格不是命令");
    }

    #[test]
    fn test_ctrl_arrows_drive_navigation() {
        assert_eq!(map_key(Key::ArrowUp, true, false), Some(Command::NavPrev));
        assert_eq!(map_key(Key::ArrowDown, true, false), Some(Command::NavNext));
        assert_eq!(map_key(Key::ArrowRight, true, false), Some(Command::NavIn));
        assert_eq!(map_key(Key::ArrowLeft, true, false), Some(Command::NavOut));
    }

    #[test]
    fn test_bare_arrows_only_in_search() {
        assert_eq!(map_key(Key::ArrowUp, false, true), Some(Command::HistoryUp));
        assert_eq!(map_key(Key::ArrowDown, false, true), Some(Command::HistoryDown));
        assert_eq!(map_key(Key::ArrowUp, false, false), None, "树聚焦时裸方向键不折算命令");
    }

    #[test]
    fn test_enter_escape() {
        assert_eq!(map_key(Key::Enter, false, true), Some(Command::Submit));
        assert_eq!(map_key(Key::Escape, false, true), Some(Command::Dismiss));
    }
}

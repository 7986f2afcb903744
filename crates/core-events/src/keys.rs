//! The fixed key enumeration and its printable-character mapping.

/// Every key the keyboard firmware reports. Layout order follows the
/// physical rows of the keyboard, which keeps the HID translation table a
/// straight walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Esc,
    Grave,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    Num0,
    Minus,
    Equals,
    Backspace,
    Tab,
    Q,
    W,
    E,
    R,
    T,
    Y,
    U,
    I,
    O,
    P,
    LeftBracket,
    RightBracket,
    Backslash,
    CapsLock,
    A,
    S,
    D,
    F,
    G,
    H,
    J,
    K,
    L,
    Semicolon,
    Quote,
    Enter,
    Z,
    X,
    C,
    V,
    B,
    N,
    M,
    Comma,
    Period,
    Slash,
    Space,
    Left,
    Right,
    Up,
    Down,
}

impl KeyCode {
    /// Printable character for the key, or `None` for keys with editing or
    /// navigation meaning only. Shift picks the upper legend.
    pub fn to_char(self, shift: bool) -> Option<char> {
        use KeyCode::*;
        let pair = match self {
            Q => ('q', 'Q'),
            W => ('w', 'W'),
            E => ('e', 'E'),
            R => ('r', 'R'),
            T => ('t', 'T'),
            Y => ('y', 'Y'),
            U => ('u', 'U'),
            I => ('i', 'I'),
            O => ('o', 'O'),
            P => ('p', 'P'),
            A => ('a', 'A'),
            S => ('s', 'S'),
            D => ('d', 'D'),
            F => ('f', 'F'),
            G => ('g', 'G'),
            H => ('h', 'H'),
            J => ('j', 'J'),
            K => ('k', 'K'),
            L => ('l', 'L'),
            Z => ('z', 'Z'),
            X => ('x', 'X'),
            C => ('c', 'C'),
            V => ('v', 'V'),
            B => ('b', 'B'),
            N => ('n', 'N'),
            M => ('m', 'M'),
            Num1 => ('1', '!'),
            Num2 => ('2', '@'),
            Num3 => ('3', '#'),
            Num4 => ('4', '$'),
            Num5 => ('5', '%'),
            Num6 => ('6', '^'),
            Num7 => ('7', '&'),
            Num8 => ('8', '*'),
            Num9 => ('9', '('),
            Num0 => ('0', ')'),
            Space => (' ', ' '),
            Minus => ('-', '_'),
            Equals => ('=', '+'),
            LeftBracket => ('[', '{'),
            RightBracket => (']', '}'),
            Backslash => ('\\', '|'),
            Semicolon => (';', ':'),
            Quote => ('\'', '"'),
            Comma => (',', '<'),
            Period => ('.', '>'),
            Slash => ('/', '?'),
            Grave => ('`', '~'),
            Esc | Enter | Backspace | Tab | CapsLock | Left | Right | Up | Down => return None,
        };
        Some(if shift { pair.1 } else { pair.0 })
    }

    /// Parse a key name as it appears in configuration files. Single
    /// characters name themselves (`"a"`, `"1"`, `";"`); longer names match
    /// the variant (case-insensitive).
    pub fn from_name(name: &str) -> Option<KeyCode> {
        use KeyCode::*;
        if name.chars().count() == 1 {
            let c = name.chars().next()?;
            return Self::from_base_char(c.to_ascii_lowercase());
        }
        let code = match name.to_ascii_lowercase().as_str() {
            "esc" | "escape" => Esc,
            "enter" | "return" => Enter,
            "backspace" => Backspace,
            "tab" => Tab,
            "space" => Space,
            "capslock" => CapsLock,
            "left" => Left,
            "right" => Right,
            "up" => Up,
            "down" => Down,
            _ => return None,
        };
        Some(code)
    }

    fn from_base_char(c: char) -> Option<KeyCode> {
        use KeyCode::*;
        let code = match c {
            'q' => Q,
            'w' => W,
            'e' => E,
            'r' => R,
            't' => T,
            'y' => Y,
            'u' => U,
            'i' => I,
            'o' => O,
            'p' => P,
            'a' => A,
            's' => S,
            'd' => D,
            'f' => F,
            'g' => G,
            'h' => H,
            'j' => J,
            'k' => K,
            'l' => L,
            'z' => Z,
            'x' => X,
            'c' => C,
            'v' => V,
            'b' => B,
            'n' => N,
            'm' => M,
            '1' => Num1,
            '2' => Num2,
            '3' => Num3,
            '4' => Num4,
            '5' => Num5,
            '6' => Num6,
            '7' => Num7,
            '8' => Num8,
            '9' => Num9,
            '0' => Num0,
            ' ' => Space,
            '-' => Minus,
            '=' => Equals,
            '[' => LeftBracket,
            ']' => RightBracket,
            '\\' => Backslash,
            ';' => Semicolon,
            '\'' => Quote,
            ',' => Comma,
            '.' => Period,
            '/' => Slash,
            '`' => Grave,
            _ => return None,
        };
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_round_trips_letters_and_named_keys() {
        assert_eq!(KeyCode::from_name("a"), Some(KeyCode::A));
        assert_eq!(KeyCode::from_name("A"), Some(KeyCode::A));
        assert_eq!(KeyCode::from_name("enter"), Some(KeyCode::Enter));
        assert_eq!(KeyCode::from_name("Left"), Some(KeyCode::Left));
        assert_eq!(KeyCode::from_name("f13"), None);
    }
}

// MIT License - Copyright (c) 2026 dohome-lan contributors
// DoHome LAN client

/// Built-in animation presets selectable with the preset mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColorPattern {
    Init = 0,
    SevenGradient = 1,
    RedGradient = 2,
    GreenGradient = 3,
    BlueGradient = 4,
    YellowGradient = 5,
    CyanGradient = 6,
    PurpleGradient = 7,
    WhiteGradient = 8,
    RedStrobe = 9,
    GreenStrobe = 10,
    BlueStrobe = 11,
    YellowStrobe = 12,
    RedGreenGradient = 13,
    RedBlueGradient = 14,
    GreenBlueGradient = 15,
    RedGreenJump = 16,
    RedBlueJump = 17,
    GreenBlueJump = 18,
    RedGreenStrobe = 19,
    RedBlueStrobe = 20,
    GreenBlueStrobe = 21,
    SevenJump = 22,
    SevenStrobe = 23,
    WhiteStrobe = 24,
    RgbGradient = 25,
    RgbJump = 26,
    RgbStrobe = 27,
}

impl ColorPattern {
    /// The preset index sent in the `index` field.
    pub fn index(&self) -> u8 {
        *self as u8
    }
}

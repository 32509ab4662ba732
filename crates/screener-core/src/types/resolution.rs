//! 스캐너 필드 해상도(타임프레임) 정의.
//!
//! 원격 스캐너는 `close|60`처럼 필드 이름 뒤에 봉 간격 코드를 붙여
//! 기본(일봉)이 아닌 간격으로 지표를 평가합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 스캐너 봉 해상도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 1분봉
    M1,
    /// 5분봉
    M5,
    /// 15분봉
    M15,
    /// 30분봉
    M30,
    /// 1시간봉
    H1,
    /// 2시간봉
    H2,
    /// 4시간봉
    H4,
    /// 일봉
    D1,
    /// 주봉
    W1,
    /// 월봉
    MN1,
}

impl Resolution {
    /// 모든 해상도 (짧은 간격부터).
    pub const ALL: [Resolution; 10] = [
        Resolution::M1,
        Resolution::M5,
        Resolution::M15,
        Resolution::M30,
        Resolution::H1,
        Resolution::H2,
        Resolution::H4,
        Resolution::D1,
        Resolution::W1,
        Resolution::MN1,
    ];

    /// 스캐너 필드 접미사 코드로 변환합니다.
    pub fn code(&self) -> &'static str {
        match self {
            Resolution::M1 => "1",
            Resolution::M5 => "5",
            Resolution::M15 => "15",
            Resolution::M30 => "30",
            Resolution::H1 => "60",
            Resolution::H2 => "120",
            Resolution::H4 => "240",
            Resolution::D1 => "1D",
            Resolution::W1 => "1W",
            Resolution::MN1 => "1M",
        }
    }

    /// 스캐너 접미사 코드에서 파싱합니다 (대소문자 구분).
    pub fn from_code(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == s)
    }

    /// 사용자 친화적 별칭에서 파싱합니다.
    ///
    /// `5min`, `5m`, `1hr`, `1h`, `4hr`, `daily`, `D`, `weekly`, `W`, `monthly`, `M`
    /// 같은 별칭과 스캐너 코드 자체를 모두 허용합니다.
    pub fn from_alias(s: &str) -> Option<Self> {
        // 대문자 한 글자 별칭은 분 단위 'm'과 구분되어야 한다
        match s {
            "D" => return Some(Resolution::D1),
            "W" => return Some(Resolution::W1),
            "M" => return Some(Resolution::MN1),
            _ => {}
        }
        if let Some(r) = Self::from_code(s) {
            return Some(r);
        }
        match s.to_lowercase().as_str() {
            "1min" | "1m" => Some(Resolution::M1),
            "5min" | "5m" => Some(Resolution::M5),
            "15min" | "15m" => Some(Resolution::M15),
            "30min" | "30m" => Some(Resolution::M30),
            "1hr" | "1h" => Some(Resolution::H1),
            "2hr" | "2h" => Some(Resolution::H2),
            "4hr" | "4h" => Some(Resolution::H4),
            "daily" | "1d" => Some(Resolution::D1),
            "weekly" | "1w" => Some(Resolution::W1),
            "monthly" => Some(Resolution::MN1),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| format!("Invalid resolution: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_codes() {
        for r in Resolution::ALL {
            assert_eq!(Resolution::from_code(r.code()), Some(r));
        }
        assert_eq!(Resolution::from_code("1d"), None);
    }

    #[test]
    fn test_resolution_aliases() {
        assert_eq!("5min".parse::<Resolution>().unwrap(), Resolution::M5);
        assert_eq!("1hr".parse::<Resolution>().unwrap(), Resolution::H1);
        assert_eq!("4h".parse::<Resolution>().unwrap(), Resolution::H4);
        assert_eq!("daily".parse::<Resolution>().unwrap(), Resolution::D1);
        assert_eq!("D".parse::<Resolution>().unwrap(), Resolution::D1);
        assert_eq!("M".parse::<Resolution>().unwrap(), Resolution::MN1);
        assert_eq!("1m".parse::<Resolution>().unwrap(), Resolution::M1);
        assert!("fortnightly".parse::<Resolution>().is_err());
    }
}

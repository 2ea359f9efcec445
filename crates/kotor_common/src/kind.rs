//! Resource kinds and their numeric type ids.

use std::{fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

macro_rules! resource_kinds {
    ($($variant:ident = $id:literal, $ext:literal;)*) => {
        /// Every resource kind the Odyssey engine knows, keyed by type id.
        ///
        /// Each kind maps to exactly one lowercase file extension.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(into = "String", try_from = "String"))]
        pub enum ResourceKind {
            $($variant,)*
        }

        impl ResourceKind {
            /// All kinds in type id order
            pub const ALL: &'static [ResourceKind] = &[$(ResourceKind::$variant,)*];

            /// Numeric type id as stored in archive key tables
            pub const fn id(self) -> u16 {
                match self {
                    $(ResourceKind::$variant => $id,)*
                }
            }

            /// Lowercase file extension, without the dot
            pub const fn extension(self) -> &'static str {
                match self {
                    $(ResourceKind::$variant => $ext,)*
                }
            }

            pub const fn from_id(id: u16) -> Option<Self> {
                match id {
                    $($id => Some(ResourceKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

resource_kinds! {
    Res = 0, "res";
    Bmp = 1, "bmp";
    Mve = 2, "mve";
    Tga = 3, "tga";
    Wav = 4, "wav";
    Plt = 6, "plt";
    Ini = 7, "ini";
    Mp3 = 8, "mp3";
    Mpg = 9, "mpg";
    Txt = 10, "txt";
    Wma = 11, "wma";
    Wmv = 12, "wmv";
    Xmv = 13, "xmv";
    Mdl = 2002, "mdl";
    Nss = 2009, "nss";
    Ncs = 2010, "ncs";
    Mod = 2011, "mod";
    Are = 2012, "are";
    Set = 2013, "set";
    Ifo = 2014, "ifo";
    Bic = 2015, "bic";
    Wok = 2016, "wok";
    TwoDa = 2017, "2da";
    Tlk = 2018, "tlk";
    Txi = 2022, "txi";
    Git = 2023, "git";
    Bti = 2024, "bti";
    Uti = 2025, "uti";
    Btc = 2026, "btc";
    Utc = 2027, "utc";
    Dlg = 2029, "dlg";
    Itp = 2030, "itp";
    Utt = 2032, "utt";
    Dds = 2033, "dds";
    Uts = 2035, "uts";
    Ltr = 2036, "ltr";
    Gff = 2037, "gff";
    Fac = 2038, "fac";
    Ute = 2040, "ute";
    Utd = 2042, "utd";
    Utp = 2044, "utp";
    Dft = 2045, "dft";
    Gic = 2046, "gic";
    Gui = 2047, "gui";
    Utm = 2051, "utm";
    Dwk = 2052, "dwk";
    Pwk = 2053, "pwk";
    Jrl = 2056, "jrl";
    Sav = 2057, "sav";
    Utw = 2058, "utw";
    Ssf = 2060, "ssf";
    Hak = 2061, "hak";
    Nwm = 2062, "nwm";
    Ptm = 2065, "ptm";
    Ptt = 2066, "ptt";
    Lyt = 3000, "lyt";
    Vis = 3001, "vis";
    Rim = 3002, "rim";
    Pth = 3003, "pth";
    Lip = 3004, "lip";
    Bwm = 3005, "bwm";
    Txb = 3006, "txb";
    Tpc = 3007, "tpc";
    Mdx = 3008, "mdx";
    Rsv = 3009, "rsv";
    Sig = 3010, "sig";
    Xbx = 3011, "xbx";
    Erf = 9997, "erf";
    Bif = 9998, "bif";
    Key = 9999, "key";
}

impl ResourceKind {
    /// Look a kind up by file extension, ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
            .copied()
    }

    /// Look a kind up by a 32 bit type id, as stored in RIM and BIF records.
    pub fn from_wide_id(id: u32) -> Option<Self> {
        u16::try_from(id).ok().and_then(Self::from_id)
    }

    /// Kinds that are themselves archives of resources
    pub const fn is_container(self) -> bool {
        matches!(
            self,
            Self::Erf | Self::Mod | Self::Sav | Self::Hak | Self::Nwm | Self::Rim
        )
    }

    /// Kinds stored in the generic GFF tree format
    pub const fn is_gff(self) -> bool {
        use ResourceKind::*;
        matches!(
            self,
            Res | Are
                | Ifo
                | Bic
                | Git
                | Bti
                | Uti
                | Btc
                | Utc
                | Dlg
                | Itp
                | Utt
                | Uts
                | Gff
                | Fac
                | Ute
                | Utd
                | Utp
                | Gic
                | Gui
                | Utm
                | Jrl
                | Utw
                | Ptm
                | Ptt
                | Pth
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| Error::UnknownExtension(s.to_string()))
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(value: ResourceKind) -> Self {
        value.extension().to_string()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use crate::kind::ResourceKind;

    #[test]
    fn ids_and_extensions_are_unique() {
        let ids: HashSet<u16> = ResourceKind::ALL.iter().map(|k| k.id()).collect();
        let exts: HashSet<&str> = ResourceKind::ALL.iter().map(|k| k.extension()).collect();

        assert_eq!(ids.len(), ResourceKind::ALL.len());
        assert_eq!(exts.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn lookups() {
        assert_eq!(ResourceKind::from_id(2042), Some(ResourceKind::Utd));
        assert_eq!(ResourceKind::from_id(5), None);
        assert_eq!(ResourceKind::from_wide_id(3002), Some(ResourceKind::Rim));
        assert_eq!(ResourceKind::from_wide_id(0x1_0000), None);
        assert_eq!(ResourceKind::from_extension("2DA"), Some(ResourceKind::TwoDa));
        assert_eq!("Mod".parse::<ResourceKind>().ok(), Some(ResourceKind::Mod));
        assert!("xyz".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn classification() {
        assert!(ResourceKind::Rim.is_container());
        assert!(ResourceKind::Sav.is_container());
        assert!(!ResourceKind::Bif.is_container());
        assert!(ResourceKind::Utd.is_gff());
        assert!(!ResourceKind::Tga.is_gff());
    }
}

//! Catalog of synthesis voices known to the provider.
//!
//! Roles reference voices by id. An id outside this catalog (or an empty one)
//! is never sent to the provider; [`resolve_voice`] substitutes the configured
//! default instead.

use serde::Serialize;

/// Voice used when a role has no usable voice id
pub const DEFAULT_VOICE: &str = "qiniu_zh_female_wwxkjx";

const SAMPLE_URL_BASE: &str = "https://aitoken-public.qnaigc.com/ai-voice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCategory {
    Standard,
    Bilingual,
    Character,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceInfo {
    pub voice_type: &'static str,
    pub voice_name: &'static str,
    pub category: VoiceCategory,
}

impl VoiceInfo {
    const fn new(voice_type: &'static str, voice_name: &'static str, category: VoiceCategory) -> Self {
        Self {
            voice_type,
            voice_name,
            category,
        }
    }

    pub fn sample_url(&self) -> String {
        format!("{SAMPLE_URL_BASE}/{}.mp3", self.voice_type)
    }
}

use VoiceCategory::{Bilingual, Character, Standard};

pub static VOICE_CATALOG: &[VoiceInfo] = &[
    VoiceInfo::new("qiniu_zh_female_tmjxxy", "甜美教学小源", Standard),
    VoiceInfo::new("qiniu_zh_female_xyqxxj", "校园清新学姐", Standard),
    VoiceInfo::new("qiniu_zh_male_ljfdxz", "邻家辅导学长", Standard),
    VoiceInfo::new("qiniu_zh_female_ljfdxx", "邻家辅导学姐", Standard),
    VoiceInfo::new("qiniu_zh_female_wwxkjx", "温婉学科讲师", Standard),
    VoiceInfo::new("qiniu_zh_male_szxyxd", "率真校园向导", Standard),
    VoiceInfo::new("qiniu_zh_female_glktss", "干练课堂思思", Standard),
    VoiceInfo::new("qiniu_zh_male_whxkxg", "温和学科小哥", Standard),
    VoiceInfo::new("qiniu_zh_male_wncwxz", "温暖沉稳学长", Standard),
    VoiceInfo::new("qiniu_zh_female_kljxdd", "开朗教学督导", Standard),
    VoiceInfo::new("qiniu_zh_male_ybxknjs", "渊博学科男教师", Standard),
    VoiceInfo::new("qiniu_zh_male_hlsnkk", "火力少年凯凯", Standard),
    VoiceInfo::new("qiniu_zh_male_tyygjs", "通用阳光讲师", Standard),
    VoiceInfo::new("qiniu_zh_female_zxjxnjs", "知性教学女教师", Standard),
    VoiceInfo::new("qiniu_en_female_azyy", "澳洲英语女", Bilingual),
    VoiceInfo::new("qiniu_multi_female_rxsyn1", "日西双语女1", Bilingual),
    VoiceInfo::new("qiniu_multi_male_rxsyn2", "日西双语男2", Bilingual),
    VoiceInfo::new("qiniu_en_male_ysyyn", "英式英语男", Bilingual),
    VoiceInfo::new("qiniu_en_female_ysyyn", "英式英语女", Bilingual),
    VoiceInfo::new("qiniu_en_female_msyyn", "美式英语女", Bilingual),
    VoiceInfo::new("qiniu_en_male_msyyn", "美式英语男", Bilingual),
    VoiceInfo::new("qiniu_en_male_azyyn", "澳洲英语男", Bilingual),
    VoiceInfo::new("qiniu_multi_male_rxsyn1", "日西双语男1", Bilingual),
    VoiceInfo::new("qiniu_multi_female_rxsyn2", "日西双语女2", Bilingual),
    VoiceInfo::new("qiniu_zh_female_cxjxgw", "慈祥教学顾问", Character),
    VoiceInfo::new("qiniu_zh_female_sqjyay", "社区教育阿姨", Character),
    VoiceInfo::new("qiniu_zh_female_dmytwz", "动漫樱桃丸子", Character),
    VoiceInfo::new("qiniu_zh_female_segsby", "少儿故事配音", Character),
    VoiceInfo::new("qiniu_zh_male_qslymb", "轻松懒音绵宝", Character),
    VoiceInfo::new("qiniu_zh_male_hllzmz", "活力率真萌仔", Character),
    VoiceInfo::new("qiniu_zh_female_wwkjby", "温婉课件配音", Character),
    VoiceInfo::new("qiniu_zh_male_etgsxe", "儿童故事熊二", Character),
    VoiceInfo::new("qiniu_zh_male_gzjjxb", "古装剧教学版", Character),
    VoiceInfo::new("qiniu_zh_male_cxkjns", "磁性课件男声", Character),
    VoiceInfo::new("qiniu_zh_female_qwzscb", "趣味知识传播", Character),
    VoiceInfo::new("qiniu_zh_male_mzjsxg", "名著角色猴哥", Character),
    VoiceInfo::new("qiniu_zh_female_yyqmpq", "英语启蒙佩奇", Character),
    VoiceInfo::new("qiniu_zh_male_tcsnsf", "天才少年示范", Character),
];

pub fn find_voice(voice_type: &str) -> Option<&'static VoiceInfo> {
    VOICE_CATALOG.iter().find(|v| v.voice_type == voice_type)
}

pub fn is_known_voice(voice_type: &str) -> bool {
    find_voice(voice_type).is_some()
}

/// Pick the voice to synthesize with: the requested one if it is in the catalog,
/// otherwise `default`.
pub fn resolve_voice<'a>(requested: &'a str, default: &'a str) -> &'a str {
    let requested = requested.trim();
    if is_known_voice(requested) {
        requested
    } else {
        default
    }
}
